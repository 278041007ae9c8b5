//! Double-buffered counter records on non-volatile memory
//!
//! Non-volatile memory is modelled as [`SLOTS`] fixed-size slots. Each
//! commit writes a complete record into the slot that does *not* hold the
//! newest valid record, so a write interrupted by power loss can only damage
//! the stale copy. On load, the valid record with the highest sequence
//! number wins.
//!
//! The first commit to erased memory anchors slot 0 with a zero record
//! before writing the new value to slot 1. Slot 1 is never erased again once
//! written, so a damaged slot 0 next to an erased slot 1 can only be an
//! interrupted anchor write, and loads as "never committed".
//!
//! Record layout (big-endian):
//!
//! | bytes  | field                                  |
//! |--------|----------------------------------------|
//! | 0..4   | magic `OTPC`                           |
//! | 4..8   | sequence number                        |
//! | 8..16  | counter value                          |
//! | 16..20 | first four bytes of SHA-256 of 0..16   |

use crate::{
    counter::CounterStore,
    error::{Error, Result},
};
use log::{debug, error, warn};
use nom::{
    bytes::complete::{tag, take},
    combinator::eof,
    number::complete::{be_u32, be_u64},
    IResult,
};
use sha2::{Digest, Sha256};
use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

/// Number of record slots
pub const SLOTS: usize = 2;

/// Size of one record in bytes
pub const RECORD_LEN: usize = 20;

const MAGIC: &[u8; 4] = b"OTPC";
const BODY_LEN: usize = 16;

/// Slot-addressed non-volatile memory.
pub trait Nvm {
    /// Read the raw contents of `slot`.
    fn read_slot(&mut self, slot: usize) -> Result<[u8; RECORD_LEN]>;

    /// Write `record` into `slot` and wait until it is durable.
    fn write_slot(&mut self, slot: usize, record: &[u8; RECORD_LEN]) -> Result<()>;
}

/// A decoded counter record
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Record {
    sequence: u32,
    value: u64,
}

impl Record {
    fn encode(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[..4].copy_from_slice(MAGIC);
        out[4..8].copy_from_slice(&self.sequence.to_be_bytes());
        out[8..16].copy_from_slice(&self.value.to_be_bytes());

        let check = checksum(&out[..BODY_LEN]);
        out[BODY_LEN..].copy_from_slice(&check);
        out
    }

    fn parse(input: &[u8]) -> IResult<&[u8], (Self, &[u8])> {
        let (input, _magic) = tag(&MAGIC[..])(input)?;
        let (input, sequence) = be_u32(input)?;
        let (input, value) = be_u64(input)?;
        let (input, check) = take(RECORD_LEN - BODY_LEN)(input)?;
        let (input, _) = eof(input)?;

        Ok((input, (Record { sequence, value }, check)))
    }

    /// Decode a slot, returning `None` unless magic and checksum are intact.
    fn decode(bytes: &[u8; RECORD_LEN]) -> Option<Self> {
        let (_, (record, check)) = Self::parse(bytes).ok()?;

        if check != checksum(&bytes[..BODY_LEN]) {
            return None;
        }

        Some(record)
    }
}

fn checksum(body: &[u8]) -> [u8; RECORD_LEN - BODY_LEN] {
    let digest = Sha256::digest(body);
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Erased flash reads as all ones; a freshly created file reads as all zeroes.
fn is_erased(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0xff) || bytes.iter().all(|&b| b == 0x00)
}

/// Counter store keeping double-buffered records on an [`Nvm`].
#[derive(Debug)]
pub struct SlotStore<N> {
    nvm: N,

    /// Slot and sequence number of the newest valid record
    active: Option<(usize, u32)>,
}

impl<N: Nvm> SlotStore<N> {
    /// Open the store, locating the newest valid record.
    pub fn open(nvm: N) -> Result<Self> {
        let mut store = Self { nvm, active: None };
        store.scan()?;
        Ok(store)
    }

    /// Return the inner memory
    pub fn into_inner(self) -> N {
        self.nvm
    }

    fn write_record(&mut self, slot: usize, record: Record) -> Result<()> {
        self.nvm.write_slot(slot, &record.encode())?;
        self.active = Some((slot, record.sequence));
        Ok(())
    }

    fn scan(&mut self) -> Result<Option<u64>> {
        let mut newest: Option<(usize, Record)> = None;
        let mut erased = [false; SLOTS];

        for (slot, is_blank) in erased.iter_mut().enumerate() {
            let bytes = self.nvm.read_slot(slot)?;

            if is_erased(&bytes) {
                *is_blank = true;
                continue;
            }

            match Record::decode(&bytes) {
                Some(record) => {
                    if newest.map_or(true, |(_, n)| record.sequence > n.sequence) {
                        newest = Some((slot, record));
                    }
                }
                None => warn!("counter slot {} holds no valid record", slot),
            }
        }

        match newest {
            Some((slot, record)) => {
                debug!(
                    "counter record #{} in slot {}: {}",
                    record.sequence, slot, record.value
                );
                self.active = Some((slot, record.sequence));
                Ok(Some(record.value))
            }
            None if erased.iter().all(|&blank| blank) => {
                self.active = None;
                Ok(None)
            }
            None if erased[1] => {
                warn!("first counter commit was interrupted; counter was never committed");
                self.active = None;
                Ok(None)
            }
            None => {
                error!("no valid counter record; refusing to restart the counter");
                Err(Error::CorruptState)
            }
        }
    }
}

impl<N: Nvm> CounterStore for SlotStore<N> {
    fn load(&mut self) -> Result<Option<u64>> {
        self.scan()
    }

    fn commit(&mut self, value: u64) -> Result<()> {
        let (slot, sequence) = match self.active {
            Some(active) => active,
            None => {
                debug!("anchoring erased counter memory");
                self.write_record(
                    0,
                    Record {
                        sequence: 0,
                        value: 0,
                    },
                )?;
                (0, 0)
            }
        };

        let sequence = sequence.checked_add(1).ok_or(Error::CounterExhausted)?;
        self.write_record((slot + 1) % SLOTS, Record { sequence, value })
    }
}

/// Non-volatile memory simulated in RAM, starting erased.
#[derive(Clone, Debug)]
pub struct MemoryNvm {
    slots: [[u8; RECORD_LEN]; SLOTS],

    /// Number of bytes the next write stores before "losing power"
    tear_next: Option<usize>,
}

impl MemoryNvm {
    /// Create erased memory.
    pub fn new() -> Self {
        Self {
            slots: [[0xff; RECORD_LEN]; SLOTS],
            tear_next: None,
        }
    }

    /// Interrupt the next write after `bytes` bytes, as a power loss would.
    pub fn tear_next_write(&mut self, bytes: usize) {
        self.tear_next = Some(bytes.min(RECORD_LEN));
    }

    /// Raw slot contents, or `None` past the last slot
    pub fn slot(&self, slot: usize) -> Option<&[u8; RECORD_LEN]> {
        self.slots.get(slot)
    }

    /// Mutable raw slot contents, or `None` past the last slot
    pub fn slot_mut(&mut self, slot: usize) -> Option<&mut [u8; RECORD_LEN]> {
        self.slots.get_mut(slot)
    }
}

impl Default for MemoryNvm {
    fn default() -> Self {
        Self::new()
    }
}

impl Nvm for MemoryNvm {
    fn read_slot(&mut self, slot: usize) -> Result<[u8; RECORD_LEN]> {
        self.slots.get(slot).copied().ok_or(Error::SizeError)
    }

    fn write_slot(&mut self, slot: usize, record: &[u8; RECORD_LEN]) -> Result<()> {
        let target = self.slots.get_mut(slot).ok_or(Error::SizeError)?;

        if let Some(written) = self.tear_next.take() {
            target[..written].copy_from_slice(&record[..written]);
            return Err(Error::Storage {
                kind: io::ErrorKind::Interrupted,
            });
        }

        *target = *record;
        Ok(())
    }
}

/// Non-volatile memory backed by a file holding both slots.
#[derive(Debug)]
pub struct FileNvm {
    file: File,
    path: PathBuf,
}

impl FileNvm {
    /// Open or create the state file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_owned();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                error!("could not open counter state {}: {}", path.display(), e);
                e
            })?;

        let len = (SLOTS * RECORD_LEN) as u64;
        if file.metadata()?.len() < len {
            file.set_len(len)?;
            file.sync_all()?;
        }

        Ok(Self { file, path })
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn offset(slot: usize) -> Result<u64> {
        if slot >= SLOTS {
            return Err(Error::SizeError);
        }

        Ok((slot * RECORD_LEN) as u64)
    }
}

impl Nvm for FileNvm {
    fn read_slot(&mut self, slot: usize) -> Result<[u8; RECORD_LEN]> {
        let mut buf = [0u8; RECORD_LEN];
        self.file.seek(SeekFrom::Start(Self::offset(slot)?))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_slot(&mut self, slot: usize, record: &[u8; RECORD_LEN]) -> Result<()> {
        self.file.seek(SeekFrom::Start(Self::offset(slot)?))?;
        self.file.write_all(record)?;
        self.file.sync_data()?;
        Ok(())
    }
}
