use crate::error::Error;

/// Meaning of the first byte of the ball when termination is propagated
/// through the circulation. Without propagation the ball is opaque and this
/// byte is never read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue = 0,
    StopRequested = 1,
    Stop = 2,
}

/**
 * The fixed-size buffer that gets passed between ranks. It is allocated once
 * per rank before the start barrier and never resized; its content only
 * matters insofar as it occupies `len` bytes on the wire.
 */
#[derive(Debug)]
pub struct Ball {
    bytes: Vec<u8>,
}

impl Ball {
    /// Allocate a zeroed ball of the given size. An allocation failure is
    /// reported rather than aborting the process.
    pub fn allocate(size: usize) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::Config("ball size must be positive".into()));
        }
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| Error::Allocation(size))?;
        bytes.resize(size, 0);
        Ok(Self { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn control(&self) -> Control {
        match self.bytes[0] {
            1 => Control::StopRequested,
            2 => Control::Stop,
            _ => Control::Continue,
        }
    }

    pub fn set_control(&mut self, control: Control) {
        self.bytes[0] = control as u8
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn ball_is_allocated_zeroed() {
        let ball = Ball::allocate(64).unwrap();
        assert_eq!(ball.len(), 64);
        assert!(ball.as_slice().iter().all(|&b| b == 0));
        assert_eq!(ball.control(), Control::Continue);
    }

    #[test]
    fn empty_ball_is_rejected() {
        assert!(Ball::allocate(0).is_err());
    }

    #[test]
    fn control_byte_is_the_first_byte() {
        let mut ball = Ball::allocate(4).unwrap();
        ball.set_control(Control::StopRequested);
        assert_eq!(ball.as_slice(), &[1, 0, 0, 0]);
        ball.set_control(Control::Stop);
        assert_eq!(ball.control(), Control::Stop);
        assert_eq!(ball.len(), 4);
    }
}
