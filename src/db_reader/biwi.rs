use byteorder::ReadBytesExt;
use byteorder;
use std::io::{Read, Result as IOResult, BufRead, BufReader};
use std::result::Result;
use super::reader::HeadTransformation as GT;
use types::*;
use super::reader::*;
use regex::Regex;
use std::num::ParseFloatError;

use std::fs::{read_dir, File};
use std::path::{Path, PathBuf};
use std::io;
use std::error::Error;
use std::fmt;

pub type BResult<T> = Result<T, BiwiReadError>;

/// Name of the calibration file within a frame directory
pub const CALIBRATION_FILE: &'static str = "depth.cal";

/// Suffix of compressed depth files
pub const DEPTH_SUFFIX: &'static str = "_depth.bin";

/// Suffix of ground truth files
pub const POSE_SUFFIX: &'static str = "_pose.bin";

// Parse Functions

/// Parse Calibration-File and extract the intrinsic matrix
/// (the first three lines with three numbers each).
pub fn read_cal<R: BufRead>(mut reader: R) -> BResult<IntrinsicMatrix> {
    use std::f32;
    use std::str::FromStr;
    lazy_static! {
        static ref FLOAT: Regex = Regex::new(r"[-+]?\d+(\.\d*)?([eE][-+]?\d+)?").unwrap();
    }
    let mut res = [[0.0; 3]; 3];
    let mut text = String::new();
    for j in 0..3 {
        text.clear();
        if reader.read_line(&mut text)? == 0 {
            return Err(BiwiReadError::InvalidFile("calibration file too short".to_string()));
        }
        let mut found = 0;
        for m in FLOAT.find_iter(&*text) {
            if found == 3 {
                return Err(BiwiReadError::InvalidFile(format!("unsupported calibration line '{}'",
                                                              text.trim())));
            }
            res[j][found] = f32::from_str(m.as_str())?;
            found += 1;
        }
        if found != 3 {
            return Err(BiwiReadError::InvalidFile(format!("unsupported calibration line '{}'",
                                                          text.trim())));
        }
    }
    Ok(IntrinsicMatrix::new(res))
}

/// Parse the ground truth file: `[x, y, z, pitch, yaw, roll]`
pub fn read_pose<R: Read>(mut reader: R) -> IOResult<Pose> {
    type End = byteorder::LittleEndian;
    let mut res = [0f32; POSE_SIZE];
    for v in res.iter_mut() {
        *v = reader.read_f32::<End>()?;
    }
    Ok(res)
}

/// Parse the ground truth file and project the head center into the image
fn read_gt<R: Read>(reader: R, intrinsic: &IntrinsicMatrix) -> IOResult<GT> {
    Ok(GT::from_pose(&read_pose(reader)?, intrinsic))
}

/// Parse a file to extract a depth image.
///
/// The file starts with the width and the height. Then runs follow, each
/// consisting of the number of empty pixels, the number of pixels with data
/// and their depth values.
pub fn read_depth<R: Read>(mut reader: R) -> BResult<DepthImage> {
    type End = byteorder::LittleEndian;
    let width = reader.read_i32::<End>()?;
    let height = reader.read_i32::<End>()?;
    if width < 0 || height < 0 {
        return Err(BiwiReadError::InvalidFile(format!("invalid image size {}x{}", width, height)));
    }
    let total = width as usize * height as usize;
    let mut data = vec![0u16; total];
    let mut p = 0usize;
    while p < total {
        let num_empty = reader.read_i32::<End>()?;
        let num_full = reader.read_i32::<End>()?;
        if num_empty < 0 || num_full < 0 ||
           p + num_empty as usize + num_full as usize > total {
            return Err(BiwiReadError::InvalidFile(format!("invalid run ({}, {}) at pixel {}",
                                                          num_empty,
                                                          num_full,
                                                          p)));
        }
        p += num_empty as usize;
        for _ in 0..num_full {
            let next = reader.read_i16::<End>()?;
            data[p] = if next > 0 { next as u16 } else { 0 };
            p += 1;
        }
    }
    DepthImage::from_raw(width as u32, height as u32, data)
        .ok_or_else(|| BiwiReadError::InvalidFile("invalid image size".to_string()))
}

/// The ground truth file belonging to a depth file:
/// everything up to the last '_' followed by `_pose.bin`
pub fn pose_path<P: AsRef<Path>>(depth_path: P) -> Option<PathBuf> {
    let depth_path = depth_path.as_ref();
    let name = depth_path.file_name().and_then(|x| x.to_str())?;
    let prefix = &name[..name.rfind('_')?];
    Some(depth_path.with_file_name(format!("{}{}", prefix, POSE_SUFFIX)))
}

/// The calibration file belonging to a depth file (within the same directory)
pub fn calibration_path<P: AsRef<Path>>(depth_path: P) -> PathBuf {
    let depth_path = depth_path.as_ref();
    match depth_path.parent() {
        Some(dir) => dir.join(CALIBRATION_FILE),
        None => PathBuf::from(CALIBRATION_FILE),
    }
}

/// Loads a compressed depth frame using the given intrinsic matrix.
/// The ground truth is read if its file exists.
pub fn load_frame_with_intrinsic<P: AsRef<Path>>(depth_path: P,
                                                 intrinsic: IntrinsicMatrix)
                                                 -> BResult<DepthFrame> {
    let depth_path = depth_path.as_ref();
    let depth = read_depth(BufReader::new(File::open(depth_path)?))?;
    let truth = match pose_path(depth_path) {
        Some(ref path) if path.exists() => {
            Some(read_gt(BufReader::new(File::open(path)?), &intrinsic)?)
        }
        _ => None,
    };
    Ok(DepthFrame {
        depth: depth,
        intrinsic: intrinsic,
        truth: truth,
    })
}

/// Loads a compressed depth frame. The calibration file has to be
/// in the same directory.
pub fn load_frame<P: AsRef<Path>>(depth_path: P) -> BResult<DepthFrame> {
    let depth_path = depth_path.as_ref();
    let cal_path = calibration_path(depth_path);
    let cal_file = match File::open(&cal_path) {
        Ok(x) => x,
        Err(_) => {
            return Err(BiwiReadError::Unspecific(Some(format!("{} not found next to the depth image",
                                                              cal_path.display()))))
        }
    };
    let intrinsic = read_cal(BufReader::new(cal_file))?;
    load_frame_with_intrinsic(depth_path, intrinsic)
}

// Error Definitions

#[derive(Debug)]
pub enum BiwiReadError {
    DirectoryExpected(Option<String>),
    IoError(io::Error),
    ParseFloatError(ParseFloatError),
    InvalidFile(String),
    Unspecific(Option<String>),
}

use std::convert::From;
impl From<io::Error> for BiwiReadError {
    fn from(err: io::Error) -> Self {
        BiwiReadError::IoError(err)
    }
}

impl From<ParseFloatError> for BiwiReadError {
    fn from(err: ParseFloatError) -> Self {
        BiwiReadError::ParseFloatError(err)
    }
}

impl fmt::Display for BiwiReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            BiwiReadError::DirectoryExpected(Some(ref x)) => {
                write!(f, "Directory not found. Dirname: {}", x)
            }
            BiwiReadError::DirectoryExpected(None) => {
                write!(f, "Directory not found. Dirname: (cannot interpret dirame)")
            }
            BiwiReadError::IoError(ref io) => io.fmt(f),
            BiwiReadError::ParseFloatError(ref err) => err.fmt(f),
            BiwiReadError::InvalidFile(ref x) => write!(f, "Invalid file: {}", x),
            BiwiReadError::Unspecific(ref x) => {
                write!(f, "Unspecific: {}", x.as_ref().map(|x| &**x).unwrap_or("-"))
            }
        }
    }
}

impl Error for BiwiReadError {
    fn description(&self) -> &str {
        match *self {
            BiwiReadError::DirectoryExpected(_) => "Directory not found",
            BiwiReadError::InvalidFile(_) => "Invalid file",
            BiwiReadError::Unspecific(_) => "Unspecific error",
            BiwiReadError::IoError(ref err) => err.description(),
            BiwiReadError::ParseFloatError(ref err) => err.description(),
        }
    }
    fn cause(&self) -> Option<&Error> {
        match *self {
            BiwiReadError::IoError(ref err) => Some(err),
            BiwiReadError::ParseFloatError(ref err) => Some(err),
            BiwiReadError::DirectoryExpected(_) |
            BiwiReadError::InvalidFile(_) |
            BiwiReadError::Unspecific(_) => None,
        }
    }
}

// Define Reader

/// A reader for a directory of the BIWI Database
/// (e.g. `hpdb/01` containing `frame_00003_depth.bin`, ... and `depth.cal`).
pub struct BiwiReader {
    dir: PathBuf,
}

impl BiwiReader {
    pub fn new<P: Into<PathBuf>>(dir: P) -> BiwiReader {
        BiwiReader { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns all compressed depth files of the directory sorted by name
    pub fn list_frames(&self) -> BResult<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Err(BiwiReadError::DirectoryExpected(self.dir.to_str().map(|x| x.to_string())));
        }
        let mut files: Vec<_> = read_dir(&self.dir)?
            .filter_map(|x| x.ok())
            .map(|x| x.path())
            .filter(|x| {
                x.is_file() &&
                x.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(DEPTH_SUFFIX))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

impl FrameReader for BiwiReader {
    type Err = BiwiReadError;
    type Iter = Box<Iterator<Item = BResult<DepthFrame>>>;

    fn frame_count(&self) -> BResult<usize> {
        Ok(self.list_frames()?.len())
    }

    fn frames(&self) -> BResult<Self::Iter> {
        let files = self.list_frames()?;
        let cal = File::open(self.dir.join(CALIBRATION_FILE))?;
        let intrinsic = read_cal(BufReader::new(cal))?;
        let res = files.into_iter().map(move |path| load_frame_with_intrinsic(path, intrinsic));
        Ok(Box::new(res))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::env::temp_dir;
    use std::fs::{create_dir_all, remove_dir_all};
    use std::io::Write;
    use std::process;

    const CAL: &'static str = "575.816 0 320\n0 575.816 240\n0 0 1\n\n0 0 0\n1 0 0\n";

    /// 3x2 image: [0, 0, 1000], [1001, 0, -5]
    fn compressed_depth() -> Vec<u8> {
        let mut buf = vec![];
        for &v in [3i32, 2, 2, 2].iter() {
            buf.write_i32::<LittleEndian>(v).unwrap();
        }
        buf.write_i16::<LittleEndian>(1000).unwrap();
        buf.write_i16::<LittleEndian>(1001).unwrap();
        for &v in [1i32, 1].iter() {
            buf.write_i32::<LittleEndian>(v).unwrap();
        }
        buf.write_i16::<LittleEndian>(-5).unwrap();
        buf
    }

    fn pose_bytes(pose: &Pose) -> Vec<u8> {
        let mut buf = vec![];
        for &v in pose.iter() {
            buf.write_f32::<LittleEndian>(v).unwrap();
        }
        buf
    }

    #[test]
    fn test_read_cal() {
        let mat = read_cal(CAL.as_bytes()).unwrap();
        assert_eq!(mat.fx(), 575.816);
        assert_eq!(mat.fy(), 575.816);
        assert_eq!(mat.cx(), 320.0);
        assert_eq!(mat.cy(), 240.0);
        let mat = read_cal("-1.5 2e2 3\n4 5 6\n7 8 9\n".as_bytes()).unwrap();
        assert_eq!(mat.0[0], [-1.5, 200.0, 3.0]);

        assert!(read_cal("1 2 3\n4 5\n7 8 9\n".as_bytes()).is_err());
        assert!(read_cal("1 2 3\n4 5 6 7\n7 8 9\n".as_bytes()).is_err());
        assert!(read_cal("1 2 3\n".as_bytes()).is_err());
    }

    #[test]
    fn test_read_depth() {
        let img = read_depth(&compressed_depth()[..]).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
        let values: Vec<u16> = img.pixels().map(|p| p.data[0]).collect();
        assert_eq!(values, vec![0, 0, 1000, 1001, 0, 0]);
    }

    #[test]
    fn test_read_depth_rejects_broken_files() {
        let data = compressed_depth();
        // truncated
        assert!(read_depth(&data[..data.len() - 1]).is_err());
        // run exceeds the image
        let mut buf = vec![];
        for &v in [2i32, 1, 1, 5].iter() {
            buf.write_i32::<LittleEndian>(v).unwrap();
        }
        assert!(read_depth(&buf[..]).is_err());
        // negative size
        let mut buf = vec![];
        for &v in [-2i32, 1].iter() {
            buf.write_i32::<LittleEndian>(v).unwrap();
        }
        assert!(read_depth(&buf[..]).is_err());
    }

    #[test]
    fn test_read_pose() {
        let pose = [1.5, -2.0, 900.0, 10.0, -20.0, 5.5];
        assert_eq!(read_pose(&pose_bytes(&pose)[..]).unwrap(), pose);
        assert!(read_pose(&pose_bytes(&pose)[..20]).is_err());
    }

    #[test]
    fn test_paths() {
        assert_eq!(pose_path("db/01/frame_00004_depth.bin"),
                   Some(PathBuf::from("db/01/frame_00004_pose.bin")));
        assert_eq!(pose_path("nounderscore.bin"), None);
        assert_eq!(calibration_path("db/01/frame_00004_depth.bin"),
                   PathBuf::from("db/01/depth.cal"));
    }

    #[test]
    fn test_reader() {
        let dir = temp_dir().join(format!("headforest_biwi_{}", process::id()));
        create_dir_all(&dir).unwrap();
        File::create(dir.join(CALIBRATION_FILE)).unwrap().write_all(CAL.as_bytes()).unwrap();
        for name in ["frame_00005_depth.bin", "frame_00003_depth.bin"].iter() {
            File::create(dir.join(name)).unwrap().write_all(&compressed_depth()).unwrap();
        }
        let pose = [0.0, 0.0, 1000.0, 1.0, 2.0, 3.0];
        File::create(dir.join("frame_00003_pose.bin")).unwrap().write_all(&pose_bytes(&pose)).unwrap();
        File::create(dir.join("frame_00003_rgb.png")).unwrap();

        let reader = BiwiReader::new(&dir);
        assert_eq!(reader.frame_count().unwrap(), 2);
        let frames: Vec<_> = reader.frames().unwrap().map(|x| x.unwrap()).collect();
        assert_eq!(frames.len(), 2);
        // sorted by name
        let truth = frames[0].truth.unwrap();
        assert_eq!(truth.pose(), pose);
        assert_eq!(truth.pos2d, [320.0, 240.0]);
        assert!(frames[1].truth.is_none());
        assert_eq!(frames[1].intrinsic.cx(), 320.0);

        let frame = load_frame(dir.join("frame_00003_depth.bin")).unwrap();
        assert_eq!(frame.depth.get_pixel(2, 0).data[0], 1000);
        assert!(frame.truth.is_some());

        remove_dir_all(&dir).unwrap();
        assert!(BiwiReader::new(&dir).frame_count().is_err());
    }
}
