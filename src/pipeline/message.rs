//! What travels through a stage queue.

use crate::error::FilterError;
use crate::{Image, ImageId};

#[derive(Debug)]
pub enum Message {
    Item(Image),
    /// Stand-in for an image a transform could not produce (forward policy).
    Failed(FailedItem),
    /// One producer feeding this queue has finished.
    EndOfStream,
}

impl Message {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Message::EndOfStream)
    }

    /// Id of the image this message carries or stands in for.
    pub fn id(&self) -> Option<ImageId> {
        match self {
            Message::Item(image) => Some(image.id()),
            Message::Failed(failed) => Some(failed.id),
            Message::EndOfStream => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedItem {
    pub id: ImageId,
    pub stage: &'static str,
    pub error: FilterError,
}
