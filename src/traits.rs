use core::mem;

use cast::usize;

/// A buffer that can be resized in place
pub trait Resize {
    /// Slices the buffer in place
    fn slice_from(&mut self, offset: u16);

    /// Truncates the buffer to the specified length
    fn truncate(&mut self, len: u16);
}

impl<'a> Resize for &'a [u8] {
    fn slice_from(&mut self, offset: u16) {
        let buffer: &'a [u8] = *self;
        *self = &buffer[usize(offset)..];
    }

    fn truncate(&mut self, len: u16) {
        let len = usize(len);
        if self.len() > len {
            let buffer: &'a [u8] = *self;
            *self = &buffer[..len];
        }
    }
}

impl<'a> Resize for &'a mut [u8] {
    fn slice_from(&mut self, offset: u16) {
        let buffer = mem::take(self);
        *self = &mut buffer[usize(offset)..];
    }

    fn truncate(&mut self, len: u16) {
        let len = usize(len);
        if self.len() > len {
            let buffer = mem::take(self);
            *self = &mut buffer[..len];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Resize;

    #[test]
    fn resize() {
        let mut chunk = [0, 1, 2, 3, 4, 5, 6, 7];

        let mut buf = &mut chunk[..];
        buf.slice_from(2);
        buf.truncate(4);
        assert_eq!(buf, &mut [2, 3, 4, 5]);

        // no-op
        buf.truncate(16);
        assert_eq!(buf.len(), 4);

        let mut buf = &chunk[..];
        buf.truncate(3);
        buf.slice_from(1);
        assert_eq!(buf, &[1, 2]);
    }
}
