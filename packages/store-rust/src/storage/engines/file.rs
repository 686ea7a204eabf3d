//! File-backed [`RecordService`] implementation.
//!
//! The file is a headerless sequence of fixed-size slots (see
//! [`codec`](crate::storage::codec)). Deletes set the tombstone bit in place;
//! [`compact`](RecordService::compact) later copies the live slots down over
//! the gaps and truncates the file. The secondary index maps field values to
//! slot byte offsets and is rebuilt by a forward scan when the file is opened.
//!
//! Every mutation writes to the file before it touches the index, so an I/O
//! failure leaves the index describing what is on disk.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cabinet_core::{Conditions, Record, RecordFields, RecordId, RecordValidator, Snapshot};
use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::storage::codec::{self, SlotStatus, SLOT_SIZE, SLOT_STRIDE};
use crate::storage::error::StoreError;
use crate::storage::index::SecondaryIndex;
use crate::storage::record_store::{restore_rejection, LocationReader, Lookup, RecordService};

/// A live slot located by a scan.
struct LiveSlot {
    offset: u64,
    status: SlotStatus,
    record: Record,
}

/// Record store persisted to a single file of fixed-size slots.
pub struct FileRecordStore {
    path: PathBuf,
    file: Mutex<File>,
    index: SecondaryIndex<u64>,
    /// Largest id stored during this session, seeded from the largest live id on open.
    max_id: RecordId,
    validator: Arc<dyn RecordValidator>,
}

// ---------------------------------------------------------------------------
// Slot I/O on a raw file handle
// ---------------------------------------------------------------------------

fn slot_count(len: u64) -> Result<u64, StoreError> {
    if len % SLOT_STRIDE != 0 {
        return Err(StoreError::Corrupted(format!(
            "file length {len} is not a multiple of the slot size {SLOT_SIZE}"
        )));
    }
    Ok(len / SLOT_STRIDE)
}

/// Visits every slot from the start of the file in order.
fn for_each_slot(
    file: &mut File,
    mut visit: impl FnMut(u64, &[u8; SLOT_SIZE]) -> Result<(), StoreError>,
) -> Result<(), StoreError> {
    let count = slot_count(file.metadata()?.len())?;
    file.seek(SeekFrom::Start(0))?;
    let mut reader = BufReader::new(file);
    let mut slot = [0u8; SLOT_SIZE];
    for n in 0..count {
        reader.read_exact(&mut slot)?;
        visit(n * SLOT_STRIDE, &slot)?;
    }
    Ok(())
}

/// Rebuilds the index from the live slots and returns it with the largest live id.
fn load_index(file: &mut File) -> Result<(SecondaryIndex<u64>, RecordId), StoreError> {
    let mut index = SecondaryIndex::new();
    let mut max_id = 0;
    for_each_slot(file, |offset, slot| {
        if codec::read_status(slot)?.is_tombstone() {
            return Ok(());
        }
        let (_, record) = codec::decode(slot)?;
        max_id = max_id.max(record.id);
        index.add(offset, &record);
        Ok(())
    })?;
    Ok((index, max_id))
}

/// Copies live slots down over tombstoned ones, truncates the file and
/// returns the index of the compacted layout with the number of slots reclaimed.
///
/// Every live slot is decoded before the first write, so a corrupt slot leaves
/// the file untouched. An I/O failure during the copy can still leave a moved
/// record live at both its old and new offset.
fn compact_slots(file: &mut File) -> Result<(SecondaryIndex<u64>, usize), StoreError> {
    let mut index = SecondaryIndex::new();
    let mut moves = Vec::new();
    let mut reclaimed = 0;
    let mut write_pos = 0;
    for_each_slot(file, |read_pos, slot| {
        if codec::read_status(slot)?.is_tombstone() {
            reclaimed += 1;
            return Ok(());
        }
        let (_, record) = codec::decode(slot)?;
        if read_pos != write_pos {
            moves.push((read_pos, write_pos));
        }
        index.add(write_pos, &record);
        write_pos += SLOT_STRIDE;
        Ok(())
    })?;

    let mut slot = [0u8; SLOT_SIZE];
    for (from, to) in moves {
        file.seek(SeekFrom::Start(from))?;
        file.read_exact(&mut slot)?;
        file.seek(SeekFrom::Start(to))?;
        file.write_all(&slot)?;
    }

    file.set_len(write_pos)?;
    Ok((index, reclaimed))
}

impl FileRecordStore {
    /// Opens (creating if missing) the record file at `path` and indexes its
    /// live slots.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] if the file length is not a whole
    /// number of slots or a live slot cannot be decoded, and
    /// [`StoreError::Io`] on I/O failure.
    pub fn open(path: impl AsRef<Path>, validator: Arc<dyn RecordValidator>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let (index, max_id) = load_index(&mut file)?;
        info!(path = %path.display(), live = index.len(), max_id, "record file opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
            index,
            max_id,
            validator,
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes all written slots to disk.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the flush fails.
    pub fn sync(&self) -> Result<(), StoreError> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn file_len(&self) -> Result<u64, StoreError> {
        Ok(self.file.lock().metadata()?.len())
    }

    fn scan(
        &self,
        visit: impl FnMut(u64, &[u8; SLOT_SIZE]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut file = self.file.lock();
        for_each_slot(&mut file, visit)
    }

    fn live_slots(&self) -> Result<Vec<LiveSlot>, StoreError> {
        let mut live = Vec::new();
        self.scan(|offset, slot| {
            if codec::read_status(slot)?.is_tombstone() {
                return Ok(());
            }
            let (status, record) = codec::decode(slot)?;
            live.push(LiveSlot {
                offset,
                status,
                record,
            });
            Ok(())
        })?;
        Ok(live)
    }

    fn locate(&self, id: RecordId) -> Result<Option<LiveSlot>, StoreError> {
        let mut found = None;
        self.scan(|offset, slot| {
            let status = codec::read_status(slot)?;
            if found.is_none() && !status.is_tombstone() {
                let (_, record) = codec::decode(slot)?;
                if record.id == id {
                    found = Some(LiveSlot {
                        offset,
                        status,
                        record,
                    });
                }
            }
            Ok(())
        })?;
        Ok(found)
    }

    fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<(), StoreError> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;
        Ok(())
    }

    /// Writes `record` into a new slot at the end of the file and indexes it.
    fn append(&mut self, record: &Record) -> Result<u64, StoreError> {
        let stored = codec::stored_form(record);
        let offset = {
            let mut file = self.file.lock();
            let offset = file.seek(SeekFrom::End(0))?;
            file.write_all(&codec::encode(SlotStatus::LIVE, &stored))?;
            offset
        };
        self.index.add(offset, &stored);
        self.max_id = self.max_id.max(stored.id);
        debug!(id = stored.id, offset, "record appended");
        Ok(offset)
    }

    /// Overwrites a live slot with `record` and moves its index entries.
    fn rewrite(&mut self, slot: &LiveSlot, record: &Record) -> Result<(), StoreError> {
        let stored = codec::stored_form(record);
        self.write_at(slot.offset, &codec::encode(slot.status, &stored))?;
        self.index.reindex(slot.offset, &slot.record, &stored);
        self.max_id = self.max_id.max(stored.id);
        debug!(id = stored.id, offset = slot.offset, "record rewritten");
        Ok(())
    }

    fn rebuild_index(&mut self) -> Result<(), StoreError> {
        let (index, max_id) = load_index(&mut self.file.lock())?;
        self.index = index;
        self.max_id = self.max_id.max(max_id);
        Ok(())
    }
}

impl LocationReader for FileRecordStore {
    fn read_at(&self, location: u64) -> Result<Record, StoreError> {
        let mut slot = [0u8; SLOT_SIZE];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(location))?;
            file.read_exact(&mut slot)?;
        }
        let (status, record) = codec::decode(&slot)?;
        if status.is_tombstone() {
            return Err(StoreError::Corrupted(format!(
                "index points at tombstoned slot {location}"
            )));
        }
        Ok(record)
    }
}

impl RecordService for FileRecordStore {
    fn create(&mut self, fields: RecordFields) -> Result<RecordId, StoreError> {
        self.validator.validate(&fields)?;
        let id = self.max_id.checked_add(1).ok_or(StoreError::IdsExhausted)?;
        self.append(&Record::from_fields(id, fields))?;
        Ok(id)
    }

    fn insert(&mut self, id: RecordId, fields: RecordFields) -> Result<(), StoreError> {
        self.validator.validate(&fields)?;
        if self.locate(id)?.is_some() {
            return Err(StoreError::DuplicateId { id });
        }
        self.append(&Record::from_fields(id, fields))?;
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self.live_slots()?.into_iter().map(|s| s.record).collect())
    }

    fn live_count(&self) -> Result<usize, StoreError> {
        let mut live = 0;
        self.scan(|_, slot| {
            if !codec::read_status(slot)?.is_tombstone() {
                live += 1;
            }
            Ok(())
        })?;
        Ok(live)
    }

    fn deleted_count(&self) -> Result<usize, StoreError> {
        let mut deleted = 0;
        self.scan(|_, slot| {
            if codec::read_status(slot)?.is_tombstone() {
                deleted += 1;
            }
            Ok(())
        })?;
        Ok(deleted)
    }

    fn total_count(&self) -> Result<usize, StoreError> {
        let count = slot_count(self.file_len()?)?;
        usize::try_from(count).map_err(|_| StoreError::Corrupted(format!("{count} slots exceed address space")))
    }

    fn update(&mut self, id: RecordId, fields: RecordFields) -> Result<(), StoreError> {
        self.validator.validate(&fields)?;
        let slot = self.locate(id)?.ok_or(StoreError::NotFound { id })?;
        self.rewrite(&slot, &Record::from_fields(id, fields))
    }

    fn delete(&mut self, id: RecordId) -> Result<(), StoreError> {
        let slot = self.locate(id)?.ok_or(StoreError::NotFound { id })?;
        self.write_at(slot.offset, &slot.status.with_tombstone().to_bytes())?;
        self.index.remove(slot.offset, &slot.record);
        debug!(id, offset = slot.offset, "record tombstoned");
        Ok(())
    }

    fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        Ok(self.locate(id)?.map(|s| s.record))
    }

    fn find_by_first_name(&self, name: &str) -> Lookup<'_> {
        Lookup::new(self.index.first_name(name), self)
    }

    fn find_by_last_name(&self, name: &str) -> Lookup<'_> {
        Lookup::new(self.index.last_name(name), self)
    }

    fn find_by_date_of_birth(&self, date: NaiveDate) -> Lookup<'_> {
        Lookup::new(self.index.date_of_birth(date), self)
    }

    fn query_by_fields(&self, conditions: &[(String, String)]) -> Result<Vec<Record>, StoreError> {
        let conditions = Conditions::parse(conditions.iter().map(|(k, v)| (k, v)))?;
        let mut matched = self.get_all()?;
        matched.retain(|r| conditions.matches(r));
        Ok(matched)
    }

    fn make_snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(Snapshot::new(self.get_all()?))
    }

    fn restore(&mut self, snapshot: &Snapshot) -> Result<Vec<String>, StoreError> {
        let mut errors = Vec::new();
        for record in snapshot {
            if let Err(err) = self.validator.validate(&record.fields()) {
                warn!(id = record.id, %err, "snapshot record rejected");
                errors.push(restore_rejection(record.id, &err));
                continue;
            }
            match self.locate(record.id)? {
                Some(slot) => self.rewrite(&slot, record)?,
                None => {
                    self.append(record)?;
                }
            }
        }
        info!(
            restored = snapshot.len() - errors.len(),
            rejected = errors.len(),
            "snapshot restored"
        );
        Ok(errors)
    }

    fn compact(&mut self) -> Result<usize, StoreError> {
        let result = compact_slots(&mut self.file.lock());
        match result {
            Ok((index, reclaimed)) => {
                self.index = index;
                info!(path = %self.path.display(), reclaimed, live = self.index.len(), "record file compacted");
                Ok(reclaimed)
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "compaction failed, rebuilding index from file");
                if let Err(rebuild_err) = self.rebuild_index() {
                    warn!(%rebuild_err, "index rebuild failed");
                }
                Err(err)
            }
        }
    }
}
