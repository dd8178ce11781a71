//! DMA descriptor chains.
//!
//! The SPI DMA engine walks a linked list of descriptors, each pointing at a piece of the
//! source buffer no longer than [`DMA_CHUNK_MAX`] bytes. A display owns one chain sized for
//! its full frame at creation time and rebuilds it in place for every transfer.
//!
//! A solid fill uses a single descriptor that points at a 4 byte fill word and links back to
//! itself, so the engine keeps re-reading the same two pixels until the transaction length
//! programmed into the SPI peripheral runs out.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::DriverError;

/// Largest payload one descriptor can carry. The hardware length field is 12 bits wide and
/// the size must stay word aligned.
pub const DMA_CHUNK_MAX: usize = 4092;

/// Who may touch a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Cpu,
    Dma,
}

/// Link to the next descriptor, as an index into the same chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Next(usize),
    End,
}

/// One DMA descriptor.
///
/// The platform layer translates this into the hardware layout (owner bit, EOF bit, 12 bit
/// size and length fields, buffer and next pointers) in [`SpiRegisters::load_out_link`].
///
/// [`SpiRegisters::load_out_link`]: crate::SpiRegisters::load_out_link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaDescriptor {
    pub buf: *const u8,
    /// Buffer size, rounded up to a multiple of 4.
    pub size: u16,
    /// Number of valid bytes at `buf`.
    pub length: u16,
    /// Last descriptor of the transfer.
    pub eof: bool,
    pub owner: Owner,
    pub next: Link,
}

impl DmaDescriptor {
    const EMPTY: DmaDescriptor = DmaDescriptor {
        buf: core::ptr::null(),
        size: 0,
        length: 0,
        eof: false,
        owner: Owner::Cpu,
        next: Link::End,
    };
}

/// Number of descriptors needed to stream `bytes` bytes.
pub const fn chain_len(bytes: usize) -> usize {
    bytes.div_ceil(DMA_CHUNK_MAX)
}

const fn word_align(bytes: usize) -> usize {
    (bytes + 3) & !3
}

/// A preallocated descriptor chain.
pub struct DescriptorChain {
    links: Box<[DmaDescriptor]>,
}

// The raw buffer pointers are only dereferenced by the DMA engine while the transfer that
// installed them is running.
unsafe impl Send for DescriptorChain {}

impl DescriptorChain {
    /// A chain with no descriptors, for displays without DMA.
    pub fn empty() -> Self {
        DescriptorChain {
            links: Box::new([]),
        }
    }

    /// Allocates enough descriptors to stream a full `width` x `height` frame of 16-bit
    /// pixels.
    pub fn for_frame(width: u16, height: u16) -> Result<Self, DriverError> {
        let count = chain_len(2 * width as usize * height as usize).max(1);
        let mut links = Vec::new();
        links
            .try_reserve_exact(count)
            .map_err(|_| DriverError::OutOfMemory)?;
        links.resize(count, DmaDescriptor::EMPTY);
        Ok(DescriptorChain {
            links: links.into_boxed_slice(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.links.len()
    }

    /// True if a transfer of `bytes` bytes fits in this chain.
    pub fn fits(&self, bytes: usize) -> bool {
        chain_len(bytes) <= self.links.len()
    }

    /// Rewrites the chain to stream `len` bytes starting at `buf` and returns the used part.
    ///
    /// Every descriptor but the last carries [`DMA_CHUNK_MAX`] bytes. Callers check
    /// [`fits`](Self::fits) first; the chain is truncated to its capacity otherwise.
    pub fn build(&mut self, buf: *const u8, len: usize) -> &[DmaDescriptor] {
        let count = chain_len(len).min(self.links.len());
        let mut offset = 0;
        for (i, desc) in self.links[..count].iter_mut().enumerate() {
            let chunk = (len - offset).min(DMA_CHUNK_MAX);
            let last = i + 1 == count;
            *desc = DmaDescriptor {
                buf: buf.wrapping_add(offset),
                size: word_align(chunk) as u16,
                length: chunk as u16,
                eof: last,
                owner: Owner::Dma,
                next: if last { Link::End } else { Link::Next(i + 1) },
            };
            offset += chunk;
        }
        &self.links[..count]
    }

    /// Rewrites the first descriptor into a self-looping fill descriptor over `word`.
    pub fn build_fill(&mut self, word: *const u32) -> &[DmaDescriptor] {
        let Some(first) = self.links.first_mut() else {
            return &[];
        };
        *first = DmaDescriptor {
            buf: word.cast(),
            size: 4,
            length: 4,
            eof: false,
            owner: Owner::Dma,
            next: Link::Next(0),
        };
        &self.links[..1]
    }
}
