use crate::relocation::{ImageResolver, MemoryProbe, RelocationState};
use crate::table::{SymbolTable, TableHeader};
use crate::LoadError;
use alloc::string::String;
use alloc::vec::Vec;
use log::{info, warn};

/// Stable handle of a loaded table. Never reused within one store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u32);

/// Memory budget shared by all tables.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SymbolPool {
    capacity: usize,
    available: usize,
}

impl SymbolPool {
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            available: capacity,
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn available(&self) -> usize {
        self.available
    }

    #[must_use]
    pub const fn used(&self) -> usize {
        self.capacity - self.available
    }

    const fn charge(&mut self, bytes: usize) {
        self.available -= bytes;
    }

    const fn credit(&mut self, bytes: usize) {
        self.available += bytes;
    }
}

/// One row of the table listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSummary<'a> {
    pub id: TableId,
    pub name: &'a str,
    pub size: usize,
    pub is_current: bool,
}

struct Slot {
    id: TableId,
    table: SymbolTable,
}

/// The loaded tables, newest first, plus the "current" selection.
pub struct SymbolStore {
    slots: Vec<Slot>,
    current: Option<TableId>,
    pool: SymbolPool,
    next_id: u32,
    entry_symbol: String,
}

impl SymbolStore {
    /// `pool_bytes` bounds the summed declared size of all tables.
    /// `entry_symbol` names the global that anchors relocation.
    #[must_use]
    pub fn new(pool_bytes: usize, entry_symbol: &str) -> Self {
        Self {
            slots: Vec::new(),
            current: None,
            pool: SymbolPool::new(pool_bytes),
            next_id: 0,
            entry_symbol: String::from(entry_symbol),
        }
    }

    #[must_use]
    pub const fn pool(&self) -> SymbolPool {
        self.pool
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Validate, relocate and insert a table at the head, making it current.
    ///
    /// A table with the same name is replaced. The replacement is all or
    /// nothing: the old table stays loaded if anything about the new one
    /// fails, and its size counts as available while checking the budget.
    ///
    /// # Errors
    /// See [`LoadError`]. The store is unchanged on error.
    pub fn add(
        &mut self,
        raw: &[u8],
        host: &dyn ImageResolver,
        probe: &dyn MemoryProbe,
    ) -> Result<TableId, LoadError> {
        let hdr = TableHeader::parse(raw)?;

        let replaced = self.position(hdr.name);
        let reclaimable = replaced.map_or(0, |i| self.slots[i].table.size());
        let available = self.pool.available() + reclaimable;
        if hdr.size > available {
            return Err(LoadError::OutOfMemory {
                requested: hdr.size,
                available,
            });
        }

        let mut table = SymbolTable::parse_with(&hdr, raw)?;
        if let Some(by) = RelocationState::compute(&table, &self.entry_symbol, host, probe) {
            table.relocate(by);
        }

        if replaced.is_none() {
            self.slots
                .try_reserve(1)
                .map_err(|_| LoadError::OutOfMemory {
                    requested: hdr.size,
                    available,
                })?;
        }

        // Nothing below can fail.
        if let Some(i) = replaced {
            let old = self.slots.remove(i);
            self.pool.credit(old.table.size());
            info!("replacing symbol table {}", old.table.name());
        }
        let id = TableId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.pool.charge(table.size());
        info!(
            "loaded symbol table {} ({} bytes, {} sections)",
            table.name(),
            table.size(),
            table.sections().len()
        );
        self.slots.insert(0, Slot { id, table });
        self.current = Some(id);
        Ok(id)
    }

    /// Unlink a table and return its size to the pool.
    ///
    /// Returns `false` if no table has that name.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(i) = self.position(name) else {
            return false;
        };
        self.remove_at(i);
        true
    }

    /// Remove every table whose name matches `pattern`, returning how many went.
    ///
    /// `*` matches everything, `prefix*` matches by prefix, anything else must
    /// match exactly.
    pub fn remove_matching(&mut self, pattern: &str) -> usize {
        let mut removed = 0;
        while let Some(i) = self
            .slots
            .iter()
            .position(|s| name_matches(pattern, s.table.name()))
        {
            self.remove_at(i);
            removed += 1;
        }
        removed
    }

    pub fn remove_all(&mut self) -> usize {
        self.remove_matching("*")
    }

    fn remove_at(&mut self, i: usize) {
        let slot = self.slots.remove(i);
        self.pool.credit(slot.table.size());
        if self.current == Some(slot.id) {
            self.current = self.slots.first().map(|s| s.id);
        }
        info!("removed symbol table {}", slot.table.name());
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.table.name() == name)
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&SymbolTable> {
        self.position(name).map(|i| &self.slots[i].table)
    }

    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<TableId> {
        self.position(name).map(|i| self.slots[i].id)
    }

    #[must_use]
    pub fn get(&self, id: TableId) -> Option<&SymbolTable> {
        self.slots.iter().find(|s| s.id == id).map(|s| &s.table)
    }

    #[must_use]
    pub const fn current_id(&self) -> Option<TableId> {
        self.current
    }

    #[must_use]
    pub fn current(&self) -> Option<&SymbolTable> {
        self.current.and_then(|id| self.get(id))
    }

    /// Make the named table current.
    ///
    /// # Errors
    /// [`LoadError::NotFound`] if no table has that name.
    pub fn select(&mut self, name: &str) -> Result<TableId, LoadError> {
        let id = self.id_of(name).ok_or_else(|| {
            warn!("no symbol table named {name}");
            LoadError::NotFound
        })?;
        self.current = Some(id);
        Ok(id)
    }

    /// Tables, newest first.
    pub fn tables(&self) -> impl Iterator<Item = &SymbolTable> {
        self.slots.iter().map(|s| &s.table)
    }

    /// Current table first, then the rest newest first.
    pub(crate) fn search_order(&self) -> impl Iterator<Item = &SymbolTable> {
        let current = self.current();
        current.into_iter().chain(
            self.slots
                .iter()
                .filter(move |s| Some(s.id) != self.current)
                .map(|s| &s.table),
        )
    }

    pub fn summaries(&self) -> impl Iterator<Item = TableSummary<'_>> {
        self.slots.iter().map(|s| TableSummary {
            id: s.id,
            name: s.table.name(),
            size: s.table.size(),
            is_current: self.current == Some(s.id),
        })
    }
}

fn name_matches(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}
