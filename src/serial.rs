//! ==============================================================================
//! serial.rs - serial source abstraction
//! ==============================================================================
//!
//! purpose:
//!     the ingestion loop only sees "how many bytes are pending" and "read up
//!     to n bytes". swapping the polling uart for an interrupt driven source
//!     means another SerialSource impl, the parser is untouched.
//!
//!     - feature "hardware": real uart through rppal (8N1, non-blocking reads)
//!     - otherwise: MockSerial, a synthetic sentence stream for development
//!
//! relationships:
//!     - used by: ingest.rs, main.rs
//!     - uses: rppal (on feature="hardware")
//!
//! ==============================================================================

use crate::config::SerialConfig;
use crate::error::TransportError;

/// non-blocking byte source feeding the ingestion loop
pub trait SerialSource: Send {
    /// bytes that can be read right now without blocking
    fn bytes_available(&mut self) -> Result<usize, TransportError>;

    /// read at most `buf.len()` bytes; 0 means nothing was pending
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

#[cfg(feature = "hardware")]
pub type DefaultSerial = Uart;
#[cfg(not(feature = "hardware"))]
pub type DefaultSerial = MockSerial;

// ==============================================================================================
// REAL IMPLEMENTATION (For Raspberry Pi)
// ==============================================================================================
#[cfg(feature = "hardware")]
pub struct Uart {
    inner: rppal::uart::Uart,
}

#[cfg(feature = "hardware")]
impl Uart {
    pub fn open(config: &SerialConfig) -> anyhow::Result<Self> {
        use anyhow::Context;
        use rppal::uart::Parity;
        use std::time::Duration;

        let mut inner = rppal::uart::Uart::with_path(&config.device, config.baud_rate, Parity::None, 8, 1)
            .with_context(|| format!("failed to open uart {}", config.device))?;
        // min length 0 + zero timeout: read returns whatever is buffered
        inner
            .set_read_mode(0, Duration::ZERO)
            .context("failed to set uart read mode")?;

        tracing::info!("Using REAL UART {} @ {} baud", config.device, config.baud_rate);
        Ok(Self { inner })
    }
}

#[cfg(feature = "hardware")]
impl SerialSource for Uart {
    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        self.inner
            .input_len()
            .map_err(|e| TransportError::Serial(e.to_string()))
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.inner
            .read(buf)
            .map_err(|e| TransportError::Serial(e.to_string()))
    }
}

// ==============================================================================================
// MOCK IMPLEMENTATION (For Non-Hardware Build)
// ==============================================================================================
// one sentence per second: ten seconds of motion at a drifting distance,
// then ten seconds of quiet with no distance.

#[cfg(not(feature = "hardware"))]
pub struct MockSerial {
    counter: u64,
    pending: Vec<u8>,
    next_at: std::time::Instant,
    period: std::time::Duration,
}

#[cfg(not(feature = "hardware"))]
impl MockSerial {
    pub fn open(config: &SerialConfig) -> anyhow::Result<Self> {
        tracing::info!("Using MOCK serial source (no uart {})", config.device);
        Ok(Self::with_period(std::time::Duration::from_secs(1)))
    }

    pub fn with_period(period: std::time::Duration) -> Self {
        Self {
            counter: 0,
            pending: Vec::new(),
            next_at: std::time::Instant::now(),
            period,
        }
    }

    fn sentence(counter: u64) -> String {
        if (counter / 10) % 2 == 0 {
            let distance = 1.0 + (counter % 10) as f64 * 0.25;
            format!("$DFDMD,1,0,{distance:.3},0,0\r\n")
        } else {
            "$DFDMD,0,0,,0,0\r\n".to_string()
        }
    }

    fn refill(&mut self) {
        let now = std::time::Instant::now();
        if self.pending.is_empty() && now >= self.next_at {
            self.pending = Self::sentence(self.counter).into_bytes();
            self.counter += 1;
            self.next_at = now + self.period;
        }
    }
}

#[cfg(not(feature = "hardware"))]
impl SerialSource for MockSerial {
    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        self.refill();
        Ok(self.pending.len())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.refill();
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        tracing::debug!("[MOCK UART] read {} bytes", n);
        Ok(n)
    }
}
