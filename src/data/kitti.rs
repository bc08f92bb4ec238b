/// KITTI odometry dataset reader
///
/// Expects the standard layout:
/// - `<base>/poses/<seq>.txt`: one row-major 3x4 pose per line
/// - `<base>/sequences/<seq>/image_0/<frame:06>.png`: left grayscale camera
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use image::DynamicImage;

use super::{SequenceHandle, SequenceLoader};
use crate::geometry::Pose;

/// Reader for a KITTI odometry dataset root
#[derive(Debug, Clone)]
pub struct KittiOdometry {
    base_dir: PathBuf,
    camera: String,
}

impl KittiOdometry {
    /// Reader using the left grayscale camera (`image_0`)
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            camera: "image_0".to_string(),
        }
    }

    /// Use a different camera directory, e.g. `image_2` for left color
    pub fn with_camera(mut self, camera: impl Into<String>) -> Self {
        self.camera = camera.into();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl SequenceLoader for KittiOdometry {
    type Sequence = KittiSequence;

    fn open(&self, sequence: &str) -> crate::Result<KittiSequence> {
        let poses_path = self.base_dir.join("poses").join(format!("{}.txt", sequence));
        let poses = read_poses(&poses_path)?;
        let image_dir = self
            .base_dir
            .join("sequences")
            .join(sequence)
            .join(&self.camera);

        log::debug!(
            "Opened KITTI sequence {}: {} poses, images in {:?}",
            sequence,
            poses.len(),
            image_dir
        );

        Ok(KittiSequence {
            id: sequence.to_string(),
            image_dir,
            poses,
        })
    }
}

/// One KITTI sequence; poses are read eagerly, images on demand
#[derive(Debug, Clone)]
pub struct KittiSequence {
    id: String,
    image_dir: PathBuf,
    poses: Vec<Pose>,
}

impl KittiSequence {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn check_index(&self, i: usize) -> crate::Result<()> {
        if i >= self.poses.len() {
            return Err(crate::VOError::Data(format!(
                "Frame {} out of range for sequence {} ({} frames)",
                i,
                self.id,
                self.poses.len()
            )));
        }
        Ok(())
    }
}

impl SequenceHandle for KittiSequence {
    fn frame_count(&self) -> usize {
        self.poses.len()
    }

    fn pose(&self, i: usize) -> crate::Result<Pose> {
        self.check_index(i)?;
        Ok(self.poses[i])
    }

    fn image(&self, i: usize) -> crate::Result<DynamicImage> {
        self.check_index(i)?;
        let path = self.image_dir.join(format!("{:06}.png", i));
        Ok(image::open(&path)?)
    }
}

/// Read a KITTI pose file
pub fn read_poses<P: AsRef<Path>>(path: P) -> crate::Result<Vec<Pose>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        crate::VOError::Data(format!("Cannot open pose file {:?}: {}", path, e))
    })?;

    let mut poses = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        poses.push(parse_pose_line(&line).map_err(|msg| {
            crate::VOError::Data(format!("{:?} line {}: {}", path, line_no + 1, msg))
        })?);
    }

    Ok(poses)
}

/// Parse 12 whitespace-separated values of a row-major 3x4 matrix
fn parse_pose_line(line: &str) -> std::result::Result<Pose, String> {
    let values = line
        .split_whitespace()
        .map(|v| v.parse::<f64>().map_err(|e| format!("invalid value '{}': {}", v, e)))
        .collect::<std::result::Result<Vec<f64>, String>>()?;

    if values.len() != 12 {
        return Err(format!("expected 12 values, found {}", values.len()));
    }

    let mut pose = Pose::identity();
    for r in 0..3 {
        for c in 0..4 {
            pose[(r, c)] = values[r * 4 + c];
        }
    }
    Ok(pose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use std::fs;

    fn temp_dataset(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stateful_vo_kitti_{}_{}", name, std::process::id()));
        fs::create_dir_all(dir.join("poses")).unwrap();
        fs::create_dir_all(dir.join("sequences").join("00").join("image_0")).unwrap();
        dir
    }

    #[test]
    fn test_parse_pose_line() {
        let pose = parse_pose_line("1 0 0 1.5 0 1 0 -2 0 0 1 3.25").unwrap();
        assert_eq!(pose[(0, 3)], 1.5);
        assert_eq!(pose[(1, 3)], -2.0);
        assert_eq!(pose[(2, 3)], 3.25);
        assert_eq!(pose[(3, 3)], 1.0);
        assert_eq!(pose[(3, 0)], 0.0);
    }

    #[test]
    fn test_parse_pose_line_rejects_bad_rows() {
        assert!(parse_pose_line("1 0 0 1").is_err());
        assert!(parse_pose_line("1 0 0 x 0 1 0 0 0 0 1 0").is_err());
    }

    #[test]
    fn test_open_and_read_frames() {
        let dir = temp_dataset("open");
        fs::write(
            dir.join("poses").join("00.txt"),
            "1 0 0 0 0 1 0 0 0 0 1 0\n1 0 0 0.1 0 1 0 0 0 0 1 0.9\n",
        )
        .unwrap();
        for i in 0..2 {
            GrayImage::from_pixel(8, 4, image::Luma([i as u8 * 100]))
                .save(dir.join("sequences/00/image_0").join(format!("{:06}.png", i)))
                .unwrap();
        }

        let seq = KittiOdometry::new(&dir).open("00").unwrap();
        assert_eq!(seq.id(), "00");
        assert_eq!(seq.frame_count(), 2);
        assert_eq!(seq.pose(1).unwrap()[(2, 3)], 0.9);

        let img = seq.image(1).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (8, 4));
        assert_eq!(img.get_pixel(0, 0)[0], 100);

        assert!(matches!(seq.image(2), Err(crate::VOError::Data(_))));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_image_propagates() {
        let dir = temp_dataset("missing");
        fs::write(dir.join("poses").join("00.txt"), "1 0 0 0 0 1 0 0 0 0 1 0\n").unwrap();

        let seq = KittiOdometry::new(&dir).open("00").unwrap();
        assert!(seq.image(0).is_err());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_pose_file() {
        let loader = KittiOdometry::new("/nonexistent/kitti");
        assert!(matches!(loader.open("00"), Err(crate::VOError::Data(_))));
    }
}
