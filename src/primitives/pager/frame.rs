use parking_lot::RwLock;
use std::sync::Arc;

use crate::types::PageId;

use super::PageBuf;

pub struct Frame {
    pub id: Option<PageId>,
    pub buf: PageBuf,
    pub dirty: bool,
    pub pin_count: u32,
}

impl Frame {
    pub fn new(page_size: usize) -> Self {
        Self {
            id: None,
            buf: Arc::new(RwLock::new(vec![0u8; page_size].into_boxed_slice())),
            dirty: false,
            pin_count: 0,
        }
    }

    /// Detaches the frame from its page so it can be handed out again.
    pub fn reset(&mut self) {
        self.id = None;
        self.dirty = false;
        self.pin_count = 0;
    }
}
