/// Pose decomposition for ground-truth vectors
///
/// All ground truth goes through one [`PoseConvention`]. The default,
/// [`ZyxConvention`], emits quaternions as `(w, x, y, z)` with `w >= 0` and
/// Euler angles as intrinsic z-y-x `(yaw, pitch, roll)`, i.e.
/// `R = Rz(yaw) * Ry(pitch) * Rx(roll)`.
use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};

/// 4x4 homogeneous rigid transform
pub type Pose = Matrix4<f64>;

/// Length of an absolute ground-truth vector (translation + quaternion)
pub const SE3_DIM: usize = 7;

/// Length of a relative ground-truth vector (translation + Euler angles)
pub const FC_DIM: usize = 6;

/// Conversion between rotation matrices and their compact parameterizations
pub trait PoseConvention {
    /// Unit quaternion of the rotation block
    fn quaternion(&self, pose: &Pose) -> [f64; 4];

    /// Euler angles of the rotation block
    fn euler(&self, pose: &Pose) -> [f64; 3];

    /// Rebuild a pose from a translation and angles produced by [`Self::euler`]
    fn from_euler(&self, translation: [f64; 3], angles: [f64; 3]) -> Pose;
}

/// Quaternion `(w, x, y, z)`, Euler intrinsic z-y-x
#[derive(Debug, Clone, Copy, Default)]
pub struct ZyxConvention;

impl PoseConvention for ZyxConvention {
    fn quaternion(&self, pose: &Pose) -> [f64; 4] {
        let q = UnitQuaternion::from_rotation_matrix(&rotation(pose));
        let q = if q.w < 0.0 { -q.into_inner() } else { q.into_inner() };
        [q.w, q.i, q.j, q.k]
    }

    fn euler(&self, pose: &Pose) -> [f64; 3] {
        let (roll, pitch, yaw) = rotation(pose).euler_angles();
        [yaw, pitch, roll]
    }

    fn from_euler(&self, translation: [f64; 3], angles: [f64; 3]) -> Pose {
        let [yaw, pitch, roll] = angles;
        let r = Rotation3::from_euler_angles(roll, pitch, yaw);
        let mut pose = Pose::identity();
        pose.fixed_view_mut::<3, 3>(0, 0).copy_from(r.matrix());
        pose.fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&Vector3::from(translation));
        pose
    }
}

fn rotation(pose: &Pose) -> Rotation3<f64> {
    let m: Matrix3<f64> = pose.fixed_view::<3, 3>(0, 0).into_owned();
    Rotation3::from_matrix_unchecked(m)
}

/// Translation column of a pose
pub fn translation(pose: &Pose) -> [f64; 3] {
    [pose[(0, 3)], pose[(1, 3)], pose[(2, 3)]]
}

/// Transform taking `prev` to `curr`: `inverse(prev) * curr`
pub fn relative(prev: &Pose, curr: &Pose) -> crate::Result<Pose> {
    let inv = prev.try_inverse().ok_or_else(|| {
        crate::VOError::Data(format!("Pose is not invertible: {}", prev))
    })?;
    Ok(inv * curr)
}

/// Absolute ground truth: translation followed by quaternion
pub fn se3_vector<C: PoseConvention + ?Sized>(convention: &C, pose: &Pose) -> [f64; SE3_DIM] {
    let t = translation(pose);
    let q = convention.quaternion(pose);
    [t[0], t[1], t[2], q[0], q[1], q[2], q[3]]
}

/// Relative ground truth: translation followed by Euler angles
pub fn fc_vector<C: PoseConvention + ?Sized>(convention: &C, transform: &Pose) -> [f64; FC_DIM] {
    let t = translation(transform);
    let e = convention.euler(transform);
    [t[0], t[1], t[2], e[0], e[1], e[2]]
}
