//! Element buffer: a slot pool holding payloads as linked chains.
//!
//! Each slot carries a `previous`/`next` link pair and `element_size` bytes of
//! payload. A chain head has `previous == END` and starts with a two-byte
//! little-endian length prefix; the tail has `next == END`. A free slot has
//! both links set to `NULL`.
//!
//! ```text
//!  head (idx 4)              idx 5                 idx 9 (tail)
//! +-----+-----+---------+   +-----+-----+-----+   +-----+-----+-----+
//! | END |  5  | len|... |-->|  4  |  9  | ... |-->|  5  | END | ... |
//! +-----+-----+---------+   +-----+-----+-----+   +-----+-----+-----+
//! ```

use crate::core::{BufferError, ConfigError, ELEMENT_LENGTH_PREFIX, ELEMENT_MAX_COUNT};

/// Index of a slot in the element buffer. Chain heads are handed out as this.
pub type ElementIndex = u16;

/// Link sentinel marking either end of a chain.
const END_IDX: u16 = u16::MAX - 1;

/// Link sentinel marking a free slot.
const NULL_IDX: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Links {
    previous: u16,
    next: u16,
}

impl Links {
    const FREE: Self = Self {
        previous: NULL_IDX,
        next: NULL_IDX,
    };
}

/// Fixed pool of slots storing payloads as index-linked chains.
#[derive(Debug, Clone)]
pub struct ElementBuffer {
    /// Link pair for every slot.
    links: Vec<Links>,

    /// Payload bytes, `element_size` per slot.
    data: Vec<u8>,

    /// Usable payload bytes per slot.
    element_size: usize,

    /// Free-slot scans start here so writes rotate through the pool.
    last_write_index: usize,

    /// Number of free slots.
    free_elements: usize,
}

impl ElementBuffer {
    /// Create a buffer of `element_count` slots with `element_size` usable bytes each.
    ///
    /// A slot must at least hold the length prefix plus one byte, and the
    /// count must leave room for the link sentinels.
    pub fn new(element_size: usize, element_count: usize) -> Result<Self, ConfigError> {
        if element_size <= ELEMENT_LENGTH_PREFIX {
            return Err(ConfigError::ElementSize {
                size: element_size,
                min: ELEMENT_LENGTH_PREFIX + 1,
                max: usize::from(u16::MAX),
            });
        }
        if element_count == 0 || element_count > ELEMENT_MAX_COUNT {
            return Err(ConfigError::ElementCount(element_count));
        }

        Ok(Self {
            links: vec![Links::FREE; element_count],
            data: vec![0u8; element_count * element_size],
            element_size,
            last_write_index: 0,
            free_elements: element_count,
        })
    }

    /// Number of slots needed to store `length` bytes in slots of `element_size`.
    pub fn element_requirement(element_size: usize, length: usize) -> usize {
        (length + ELEMENT_LENGTH_PREFIX).div_ceil(element_size)
    }

    /// Number of slots this buffer needs to store `length` bytes.
    pub fn requirement_for(&self, length: usize) -> usize {
        Self::element_requirement(self.element_size, length)
    }

    /// Total number of slots.
    pub fn element_count(&self) -> usize {
        self.links.len()
    }

    /// Usable payload bytes per slot.
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Number of free slots.
    pub fn free_elements(&self) -> usize {
        self.free_elements
    }

    /// Mark every slot free and reset the write cursor.
    pub fn wipe(&mut self) {
        self.links.fill(Links::FREE);
        self.last_write_index = 0;
        self.free_elements = self.links.len();
    }

    /// Store `payload` and return the index of the new chain head.
    ///
    /// Fails without touching the pool if there are not enough free slots.
    pub fn store(&mut self, payload: &[u8]) -> Result<ElementIndex, BufferError> {
        let length = payload.len();
        let encoded_length =
            u16::try_from(length).map_err(|_| BufferError::PayloadTooLong(length))?;

        let required = self.requirement_for(length);
        if required > self.free_elements {
            return Err(BufferError::NoSpace {
                required,
                free: self.free_elements,
            });
        }

        let count = self.element_count();
        let size = self.element_size;
        let mut head = None;
        let mut previous: Option<usize> = None;
        let mut scan_from = self.last_write_index;
        let mut written = 0;

        for _ in 0..required {
            // The free count was checked above, so a free slot always exists.
            let Some(idx) = self.next_free_from(scan_from) else {
                return Err(BufferError::NoSpace {
                    required,
                    free: self.free_elements,
                });
            };

            self.links[idx] = Links {
                previous: previous.map_or(END_IDX, |p| p as u16),
                next: END_IDX,
            };

            let slot = &mut self.data[idx * size..(idx + 1) * size];
            match previous {
                None => {
                    head = Some(idx);
                    slot[..ELEMENT_LENGTH_PREFIX].copy_from_slice(&encoded_length.to_le_bytes());
                    let take = (size - ELEMENT_LENGTH_PREFIX).min(length);
                    slot[ELEMENT_LENGTH_PREFIX..ELEMENT_LENGTH_PREFIX + take]
                        .copy_from_slice(&payload[..take]);
                    written = take;
                }
                Some(p) => {
                    self.links[p].next = idx as u16;
                    let take = size.min(length - written);
                    slot[..take].copy_from_slice(&payload[written..written + take]);
                    written += take;
                }
            }

            previous = Some(idx);
            scan_from = (idx + 1) % count;
        }

        let head = head.ok_or(BufferError::NoSpace {
            required,
            free: self.free_elements,
        })?;
        self.last_write_index = previous.unwrap_or(head);
        self.free_elements -= required;

        tracing::trace!(head, slots = required, length, "stored payload chain");
        Ok(head as ElementIndex)
    }

    /// Length of the payload whose chain starts at `idx`.
    pub fn data_length(&self, idx: ElementIndex) -> Result<usize, BufferError> {
        let idx = usize::from(idx);
        if !self.is_first(idx) {
            return Err(BufferError::InvalidIndex(idx));
        }
        Ok(self.stored_length(idx))
    }

    /// Copy the payload at `idx` into `target`, returning its length.
    ///
    /// `target.len()` is the maximum accepted length.
    pub fn read(&self, idx: ElementIndex, target: &mut [u8]) -> Result<usize, BufferError> {
        let idx = usize::from(idx);
        if !self.is_first(idx) {
            return Err(BufferError::InvalidIndex(idx));
        }

        let length = self.stored_length(idx);
        if length > target.len() {
            return Err(BufferError::TooLong {
                length,
                max: target.len(),
            });
        }

        let size = self.element_size;
        let take = (size - ELEMENT_LENGTH_PREFIX).min(length);
        let head_data = self.slot(idx);
        target[..take]
            .copy_from_slice(&head_data[ELEMENT_LENGTH_PREFIX..ELEMENT_LENGTH_PREFIX + take]);

        let mut current = idx;
        let mut cursor = take;
        while cursor < length {
            let next = usize::from(self.links[current].next);
            if next >= self.element_count() || usize::from(self.links[next].previous) != current {
                return Err(BufferError::ChainCorrupted(current));
            }
            current = next;

            let take = size.min(length - cursor);
            target[cursor..cursor + take].copy_from_slice(&self.slot(current)[..take]);
            cursor += take;
        }

        if !self.is_last(current) {
            return Err(BufferError::ChainCorrupted(current));
        }

        Ok(length)
    }

    /// Free every slot of the chain starting at `idx`.
    ///
    /// Deleting an already deleted chain fails with `InvalidIndex`.
    pub fn delete(&mut self, idx: ElementIndex) -> Result<(), BufferError> {
        let mut current = usize::from(idx);
        if !self.is_first(current) {
            return Err(BufferError::InvalidIndex(current));
        }

        loop {
            let next = usize::from(self.links[current].next);
            let last = self.is_last(current);

            self.links[current] = Links::FREE;
            self.free_elements += 1;

            if last {
                return Ok(());
            }
            if next >= self.element_count() {
                return Err(BufferError::ChainCorrupted(current));
            }
            current = next;
        }
    }

    /// Whether the chain containing `idx` is linked consistently in both directions.
    pub fn chain_is_valid(&self, idx: ElementIndex) -> bool {
        let idx = usize::from(idx);
        idx < self.element_count()
            && self.is_in_chain(idx)
            && self.chain_ok_backwards(idx)
            && self.chain_ok_forwards(idx)
    }

    /// Whether every slot is either free or part of a valid chain, and the
    /// free count matches.
    pub fn is_consistent(&self) -> bool {
        let mut counted_free = 0;
        for idx in 0..self.element_count() {
            if self.is_free(idx) {
                counted_free += 1;
            } else if !self.chain_is_valid(idx as ElementIndex) {
                return false;
            }
        }
        counted_free == self.free_elements
    }

    fn slot(&self, idx: usize) -> &[u8] {
        &self.data[idx * self.element_size..(idx + 1) * self.element_size]
    }

    fn stored_length(&self, head: usize) -> usize {
        let data = self.slot(head);
        usize::from(u16::from_le_bytes([data[0], data[1]]))
    }

    fn next_free_from(&self, start: usize) -> Option<usize> {
        let count = self.element_count();
        (0..count)
            .map(|i| (start + i) % count)
            .find(|&idx| self.is_free(idx))
    }

    fn is_link(&self, link: u16) -> bool {
        usize::from(link) < self.element_count()
    }

    fn is_free(&self, idx: usize) -> bool {
        self.links[idx] == Links::FREE
    }

    fn is_first(&self, idx: usize) -> bool {
        let Some(links) = self.links.get(idx) else {
            return false;
        };
        links.previous == END_IDX && (links.next == END_IDX || self.is_link(links.next))
    }

    fn is_last(&self, idx: usize) -> bool {
        let links = self.links[idx];
        links.next == END_IDX && (links.previous == END_IDX || self.is_link(links.previous))
    }

    fn is_in_chain(&self, idx: usize) -> bool {
        let Links { previous, next } = self.links[idx];
        let prev_ok = previous == END_IDX || self.is_link(previous);
        let next_ok = next == END_IDX || self.is_link(next);
        prev_ok && next_ok
    }

    fn chain_ok_backwards(&self, mut idx: usize) -> bool {
        // A chain can't be longer than the pool; bound the walk against cycles.
        for _ in 0..=self.element_count() {
            if !self.is_in_chain(idx) {
                return false;
            }
            if self.is_first(idx) {
                return true;
            }
            let previous = usize::from(self.links[idx].previous);
            if usize::from(self.links[previous].next) != idx {
                return false;
            }
            idx = previous;
        }
        false
    }

    fn chain_ok_forwards(&self, mut idx: usize) -> bool {
        for _ in 0..=self.element_count() {
            if !self.is_in_chain(idx) {
                return false;
            }
            if self.is_last(idx) {
                return true;
            }
            let next = usize::from(self.links[idx].next);
            if usize::from(self.links[next].previous) != idx {
                return false;
            }
            idx = next;
        }
        false
    }
}
