use derive_more::{AsRef, Deref, Display, From, Into};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Address of a single frame image, relative to the asset origin.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Deref, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct FrameAddress(String);

crate::impl_string_newtype!(FrameAddress);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("a frame sequence needs at least one frame")]
    NoFrames,
    #[error("frame digit width must be at least 1")]
    NoDigits,
}

/// Left-pads the decimal `ordinal` with zeros up to `width`. Wider ordinals are kept as-is.
pub fn zero_pad(ordinal: usize, width: usize) -> String {
    format!("{ordinal:0>width$}")
}

/// The frames of one product spin, and the template that names them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequence {
    image_path: String,
    image_prefix: String,
    image_extension: String,
    total_frames: usize,
    frame_digits: usize,
}

impl FrameSequence {
    pub fn new(
        image_path: impl Into<String>,
        image_prefix: impl Into<String>,
        image_extension: impl Into<String>,
        total_frames: usize,
        frame_digits: usize,
    ) -> Result<Self, SequenceError> {
        if total_frames == 0 {
            return Err(SequenceError::NoFrames);
        }
        if frame_digits == 0 {
            return Err(SequenceError::NoDigits);
        }

        Ok(Self {
            image_path: image_path.into(),
            image_prefix: image_prefix.into(),
            image_extension: image_extension.into(),
            total_frames,
            frame_digits,
        })
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn frame_digits(&self) -> usize {
        self.frame_digits
    }

    /// Resolves a zero-based frame index to its address. Ordinals in addresses are one-based.
    ///
    /// `index` must lie in `[0, total_frames)`.
    pub fn address(&self, index: usize) -> FrameAddress {
        debug_assert!(
            index < self.total_frames,
            "frame index {index} outside sequence of {}",
            self.total_frames
        );

        FrameAddress(format!(
            "{}{}-{}.{}",
            self.image_path,
            self.image_prefix,
            zero_pad(index + 1, self.frame_digits),
            self.image_extension
        ))
    }

    pub fn thumbnail(&self) -> FrameAddress {
        self.address(0)
    }

    /// Every frame address, in index order.
    pub fn addresses(&self) -> impl Iterator<Item = (usize, FrameAddress)> + '_ {
        (0..self.total_frames).map(|i| (i, self.address(i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drill() -> FrameSequence {
        FrameSequence::new("/drill-images/", "drill", "jpg", 36, 2).unwrap()
    }

    #[test]
    fn test_zero_pad() {
        assert_eq!(zero_pad(1, 3), "001");
        assert_eq!(zero_pad(1, 2), "01");
        assert_eq!(zero_pad(100, 2), "100");
        assert_eq!(zero_pad(36, 2), "36");
    }

    #[test]
    fn test_first_and_last_address() {
        let seq = drill();
        assert_eq!(seq.address(0).as_str(), "/drill-images/drill-01.jpg");
        assert_eq!(seq.address(35).as_str(), "/drill-images/drill-36.jpg");
        assert_eq!(seq.thumbnail(), seq.address(0));
    }

    #[test]
    fn test_adidas_last_frame() {
        let seq = FrameSequence::new("/adidas-images/", "adidas", "jpg", 71, 3).unwrap();
        assert_eq!(seq.address(70).as_str(), "/adidas-images/adidas-071.jpg");
    }

    #[test]
    fn test_addresses_cover_whole_sequence() {
        let seq = FrameSequence::new("/box00/", "box", "jpeg", 4, 3).unwrap();
        let all: Vec<_> = seq.addresses().map(|(_, a)| a.to_string()).collect();
        assert_eq!(
            all,
            vec![
                "/box00/box-001.jpeg",
                "/box00/box-002.jpeg",
                "/box00/box-003.jpeg",
                "/box00/box-004.jpeg",
            ]
        );
    }

    #[test]
    fn test_rejects_empty_sequences() {
        assert_eq!(
            FrameSequence::new("/x/", "x", "jpg", 0, 2),
            Err(SequenceError::NoFrames)
        );
        assert_eq!(
            FrameSequence::new("/x/", "x", "jpg", 3, 0),
            Err(SequenceError::NoDigits)
        );
    }
}
