use super::{Handle, Heap, Val};
use crate::error;
use crate::lang::{Error, Type};
use std::collections::HashMap;

type Result<T> = std::result::Result<T, Error>;

pub type VarId = usize;

pub const MAX_DIMENSIONS: usize = 5;
pub const DEFAULT_STRING_LENGTH: usize = 255;
const NUMERIC_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Storage {
    Float(f64),
    Integer(i64),
    Heap(Handle),
    /// Never owns storage. Resolves through exactly one indirection.
    Alias {
        target: VarId,
        element: Option<usize>,
    },
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub ty: Type,
    pub level: usize,
    /// Upper bound of each dimension; empty for a scalar.
    pub dims: Vec<i64>,
    pub base: i64,
    pub str_len: usize,
    pub constant: bool,
    pub storage: Storage,
}

impl Entry {
    pub fn is_array(&self) -> bool {
        !self.dims.is_empty()
    }

    fn element_size(&self) -> usize {
        match self.ty {
            Type::String => self.str_len + 1,
            _ => NUMERIC_SIZE,
        }
    }
}

/// Elements in an array with these bounds; 1 for a scalar. Every extent
/// and the total fit in `usize`, so indexing can't overflow afterwards.
fn element_count(dims: &[i64], base: i64) -> Result<usize> {
    dims.iter().try_fold(1usize, |count, bound| {
        bound
            .checked_sub(base)
            .and_then(|n| n.checked_add(1))
            .and_then(|n| usize::try_from(n).ok())
            .and_then(|extent| count.checked_mul(extent))
            .ok_or_else(|| error!(OutOfMemory; "ARRAY TOO LARGE"))
    })
}

/// Resolved storage of one variable or one array element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub var: VarId,
    pub element: Option<usize>,
    pub ty: Type,
}

/// ## Variable memory
///
/// Entries are looked up by name and level. Numeric scalars live inline,
/// strings and arrays live on the heap.
#[derive(Debug, Default)]
pub struct VarTable {
    entries: Vec<Option<Entry>>,
    index: HashMap<String, Vec<VarId>>,
    free: Vec<VarId>,
}

impl VarTable {
    pub fn new() -> VarTable {
        VarTable::default()
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, name: &str, level: usize) -> Option<VarId> {
        self.index.get(name)?.iter().copied().find(|id| {
            self.entries[*id]
                .as_ref()
                .map_or(false, |entry| entry.level == level)
        })
    }

    pub fn entry(&self, id: VarId) -> Result<&Entry> {
        match self.entries.get(id) {
            Some(Some(entry)) => Ok(entry),
            _ => Err(error!(InternalError; "NO SUCH VARIABLE")),
        }
    }

    pub fn entry_mut(&mut self, id: VarId) -> Result<&mut Entry> {
        match self.entries.get_mut(id) {
            Some(Some(entry)) => Ok(entry),
            _ => Err(error!(InternalError; "NO SUCH VARIABLE")),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Entry)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(id, entry)| entry.as_ref().map(|e| (id, e)))
    }

    fn insert(&mut self, entry: Entry) -> VarId {
        let name = entry.name.clone();
        let id = match self.free.pop() {
            Some(id) => {
                self.entries[id] = Some(entry);
                id
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };
        self.index.entry(name).or_default().push(id);
        id
    }

    /// Creates a variable with fresh storage. `dims` holds upper bounds.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        heap: &mut Heap,
        name: &str,
        ty: Type,
        level: usize,
        dims: Vec<i64>,
        base: i64,
        str_len: usize,
    ) -> Result<VarId> {
        if dims.len() > MAX_DIMENSIONS {
            return Err(error!(Dimensions; "TOO MANY DIMENSIONS"));
        }
        if dims.iter().any(|bound| *bound < base) {
            return Err(error!(Dimensions; "INVALID BOUND"));
        }
        if str_len > DEFAULT_STRING_LENGTH || str_len == 0 {
            return Err(error!(StringTooLong; "INVALID STRING LENGTH"));
        }
        let count = element_count(&dims, base)?;
        let mut entry = Entry {
            name: name.to_string(),
            ty,
            level,
            dims,
            base,
            str_len,
            constant: false,
            storage: Storage::Integer(0),
        };
        entry.storage = if entry.is_array() || ty == Type::String {
            let size = count
                .checked_mul(entry.element_size())
                .ok_or_else(|| error!(OutOfMemory))?;
            Storage::Heap(heap.alloc(size)?)
        } else if ty == Type::Float {
            Storage::Float(0.0)
        } else {
            Storage::Integer(0)
        };
        Ok(self.insert(entry))
    }

    /// Creates a name that refers to existing storage.
    pub fn alias(&mut self, name: &str, level: usize, target: Slot) -> Result<VarId> {
        let owner = self.entry(target.var)?;
        let (dims, base) = if target.element.is_none() {
            (owner.dims.clone(), owner.base)
        } else {
            (vec![], owner.base)
        };
        let entry = Entry {
            name: name.to_string(),
            ty: owner.ty,
            level,
            dims,
            base,
            str_len: owner.str_len,
            constant: owner.constant,
            storage: Storage::Alias {
                target: target.var,
                element: target.element,
            },
        };
        Ok(self.insert(entry))
    }

    pub fn remove(&mut self, id: VarId, heap: &mut Heap) -> Result<()> {
        let entry = match self.entries.get_mut(id).and_then(|e| e.take()) {
            Some(entry) => entry,
            None => return Err(error!(InternalError; "NO SUCH VARIABLE")),
        };
        if let Some(ids) = self.index.get_mut(&entry.name) {
            ids.retain(|i| *i != id);
            if ids.is_empty() {
                self.index.remove(&entry.name);
            }
        }
        self.free.push(id);
        if let Storage::Heap(handle) = entry.storage {
            heap.free(handle)?;
        }
        Ok(())
    }

    /// Destroys every variable at `level` or deeper.
    pub fn drop_level(&mut self, level: usize, heap: &mut Heap) -> Result<()> {
        let ids: Vec<VarId> = self
            .iter()
            .filter(|(_, e)| e.level >= level)
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            self.remove(id, heap)?;
        }
        Ok(())
    }

    pub fn clear(&mut self, heap: &mut Heap) -> Result<()> {
        self.drop_level(0, heap)?;
        self.entries.clear();
        self.free.clear();
        Ok(())
    }

    /// Follows an alias to the variable that owns the storage.
    pub fn resolve(&self, id: VarId) -> Result<(VarId, Option<usize>)> {
        match self.entry(id)?.storage {
            Storage::Alias { target, element } => Ok((target, element)),
            _ => Ok((id, None)),
        }
    }

    /// Flattened element for a list of indices:
    /// `sum((i_k - base) * prod(extent_j for j < k))`.
    pub fn element(&self, id: VarId, indices: &[i64]) -> Result<usize> {
        let entry = self.entry(id)?;
        if !entry.is_array() {
            return Err(error!(NotAnArray));
        }
        if indices.len() != entry.dims.len() {
            return Err(error!(Dimensions; "WRONG NUMBER OF INDICES"));
        }
        let mut offset = 0usize;
        let mut stride = 1usize;
        for (index, bound) in indices.iter().zip(entry.dims.iter()) {
            if *index < entry.base || index > bound {
                return Err(error!(SubscriptOutOfRange; format!("{} IS OUT OF BOUNDS", index)));
            }
            offset += (index - entry.base) as usize * stride;
            stride *= (bound - entry.base + 1) as usize;
        }
        Ok(offset)
    }

    /// Slot for `id` with optional indices, resolving aliases.
    pub fn slot(&self, id: VarId, indices: Option<&[i64]>) -> Result<Slot> {
        let ty = self.entry(id)?.ty;
        let (owner, element) = self.resolve(id)?;
        let element = match (element, indices) {
            (Some(_), Some(_)) => return Err(error!(NotAnArray)),
            (Some(e), None) => Some(e),
            (None, Some(indices)) => Some(self.element(owner, indices)?),
            (None, None) => None,
        };
        Ok(Slot {
            var: owner,
            element,
            ty,
        })
    }

    pub fn load(&self, heap: &Heap, slot: Slot) -> Result<Val> {
        let entry = self.entry(slot.var)?;
        if entry.is_array() && slot.element.is_none() {
            return Err(error!(Dimensions; "ARRAY NEEDS AN INDEX"));
        }
        match entry.storage {
            Storage::Float(n) => Ok(Val::Float(n)),
            Storage::Integer(n) => Ok(Val::Integer(n)),
            Storage::Heap(handle) => {
                let memory = heap.get(handle)?;
                let size = entry.element_size();
                let at = slot.element.unwrap_or(0) * size;
                let bytes = memory
                    .get(at..at + size)
                    .ok_or_else(|| error!(SubscriptOutOfRange))?;
                let mut word = [0u8; NUMERIC_SIZE];
                match entry.ty {
                    Type::String => {
                        let len = (bytes[0] as usize).min(entry.str_len);
                        Ok(Val::String(bytes[1..1 + len].to_vec()))
                    }
                    Type::Float => {
                        word.copy_from_slice(bytes);
                        Ok(Val::Float(f64::from_le_bytes(word)))
                    }
                    Type::Integer => {
                        word.copy_from_slice(bytes);
                        Ok(Val::Integer(i64::from_le_bytes(word)))
                    }
                }
            }
            Storage::Alias { .. } => Err(error!(InternalError; "UNRESOLVED ALIAS")),
        }
    }

    /// Assignment; constants refuse it.
    pub fn assign(&mut self, heap: &mut Heap, slot: Slot, val: Val) -> Result<()> {
        if self.entry(slot.var)?.constant {
            return Err(error!(ConstantAssignment));
        }
        self.store(heap, slot, val)
    }

    pub fn store(&mut self, heap: &mut Heap, slot: Slot, val: Val) -> Result<()> {
        let entry = self.entry_mut(slot.var)?;
        if entry.is_array() && slot.element.is_none() {
            return Err(error!(Dimensions; "ARRAY NEEDS AN INDEX"));
        }
        let val = val.convert(entry.ty)?;
        let size = entry.element_size();
        let str_len = entry.str_len;
        match &mut entry.storage {
            Storage::Float(n) => *n = f64::try_from(val)?,
            Storage::Integer(n) => *n = i64::try_from(val)?,
            Storage::Heap(handle) => {
                let memory = heap.get_mut(*handle)?;
                let at = slot.element.unwrap_or(0) * size;
                let bytes = memory
                    .get_mut(at..at + size)
                    .ok_or_else(|| error!(SubscriptOutOfRange))?;
                match val {
                    Val::String(s) => {
                        if s.len() > str_len {
                            return Err(error!(StringTooLong));
                        }
                        bytes[0] = s.len() as u8;
                        bytes[1..1 + s.len()].copy_from_slice(&s);
                    }
                    Val::Float(n) => bytes.copy_from_slice(&n.to_le_bytes()),
                    Val::Integer(n) => bytes.copy_from_slice(&n.to_le_bytes()),
                }
            }
            Storage::Alias { .. } => return Err(error!(InternalError; "UNRESOLVED ALIAS")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> (VarTable, Heap) {
        (VarTable::new(), Heap::new(64))
    }

    #[test]
    fn test_scalar_round_trip() {
        let (mut vars, mut heap) = table();
        let id = vars.create(&mut heap, "A", Type::Integer, 0, vec![], 0, 255).unwrap();
        let slot = vars.slot(id, None).unwrap();
        vars.store(&mut heap, slot, Val::Float(2.6)).unwrap();
        assert_eq!(vars.load(&heap, slot).unwrap(), Val::Integer(3));
    }

    #[test]
    fn test_array_offsets() {
        let (mut vars, mut heap) = table();
        let id = vars.create(&mut heap, "M", Type::Float, 0, vec![2, 3], 0, 255).unwrap();
        assert_eq!(vars.element(id, &[0, 0]).unwrap(), 0);
        assert_eq!(vars.element(id, &[1, 0]).unwrap(), 1);
        assert_eq!(vars.element(id, &[0, 1]).unwrap(), 3);
        assert_eq!(vars.element(id, &[2, 3]).unwrap(), 11);
        assert!(vars.element(id, &[3, 0]).is_err());
        assert!(vars.element(id, &[1]).is_err());
    }

    #[test]
    fn test_huge_bounds_are_refused() {
        let (mut vars, mut heap) = table();
        let err = vars.create(&mut heap, "A", Type::Float, 0, vec![i64::MAX], 0, 255).unwrap_err();
        assert_eq!(err.code(), crate::lang::ErrorCode::OutOfMemory);
        let err = vars.create(&mut heap, "A", Type::Float, 0, vec![i64::MAX - 1], 1, 255).unwrap_err();
        assert_eq!(err.code(), crate::lang::ErrorCode::OutOfMemory);
        let err = vars.create(&mut heap, "A", Type::Float, 0, vec![100_000; 5], 0, 255).unwrap_err();
        assert_eq!(err.code(), crate::lang::ErrorCode::OutOfMemory);
        assert!(vars.is_empty());
        assert_eq!(heap.free_pages(), heap.pages());
    }

    #[test]
    fn test_string_capacity() {
        let (mut vars, mut heap) = table();
        let id = vars.create(&mut heap, "S$", Type::String, 0, vec![2], 1, 4).unwrap();
        let slot = vars.slot(id, Some(&[2])).unwrap();
        vars.store(&mut heap, slot, Val::from("abcd")).unwrap();
        assert_eq!(vars.load(&heap, slot).unwrap(), Val::from("abcd"));
        let err = vars.store(&mut heap, slot, Val::from("abcde")).unwrap_err();
        assert_eq!(err.code(), crate::lang::ErrorCode::StringTooLong);
        assert!(vars.slot(id, Some(&[0])).is_err());
    }

    #[test]
    fn test_alias_shares_storage() {
        let (mut vars, mut heap) = table();
        let id = vars.create(&mut heap, "A", Type::Float, 0, vec![5], 0, 255).unwrap();
        let target = vars.slot(id, Some(&[4])).unwrap();
        let alias = vars.alias("X", 1, target).unwrap();
        let via = vars.slot(alias, None).unwrap();
        vars.store(&mut heap, via, Val::Float(9.5)).unwrap();
        assert_eq!(vars.load(&heap, target).unwrap(), Val::Float(9.5));
        let free = heap.free_pages();
        vars.drop_level(1, &mut heap).unwrap();
        assert_eq!(heap.free_pages(), free);
        assert_eq!(vars.load(&heap, target).unwrap(), Val::Float(9.5));
    }

    #[test]
    fn test_drop_level_frees_storage() {
        let (mut vars, mut heap) = table();
        vars.create(&mut heap, "G$", Type::String, 0, vec![], 0, 255).unwrap();
        vars.create(&mut heap, "L$", Type::String, 1, vec![], 0, 255).unwrap();
        vars.drop_level(1, &mut heap).unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(heap.free_pages(), 63);
        assert!(vars.find("L$", 1).is_none());
        assert!(vars.find("G$", 0).is_some());
    }

    #[test]
    fn test_constant_refuses_assignment() {
        let (mut vars, mut heap) = table();
        let id = vars.create(&mut heap, "K", Type::Integer, 0, vec![], 0, 255).unwrap();
        vars.entry_mut(id).unwrap().constant = true;
        let slot = vars.slot(id, None).unwrap();
        assert!(vars.assign(&mut heap, slot, Val::Integer(1)).is_err());
    }
}
