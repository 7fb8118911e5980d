//! Multi-valued relation groups on a record.
//!
//! Position 0 of a group lives directly in the record's attribute store so
//! single-valued access pays no indirection; positions >= 1 are snapshots in
//! a per-representative list. Positions are dense and 0-based: removing
//! position 0 promotes the first list entry, so no hole is ever observable.

use crate::{GroupSnapshot, Media, MediaKey, Value};

impl Media {
    /// Adds a relation-group snapshot. The first add for a group writes its
    /// fields at position 0; later adds append to the group's list. A
    /// snapshot carrying no attributes is logged and dropped.
    pub fn add_related(&mut self, snapshot: GroupSnapshot) {
        let Some(first) = snapshot.first_key() else {
            log::warn!("ignoring empty relation-group snapshot");
            return;
        };
        if snapshot.is_empty() {
            log::warn!("ignoring relation-group snapshot with no values");
            return;
        }
        let Some(rep) = self.registry().representative(first) else {
            log::warn!("ignoring snapshot for unregistered key {first:?}");
            return;
        };
        if self.related_len(rep) == 0 {
            self.write_snapshot_at_zero(&snapshot);
        } else {
            self.extended.entry(rep).or_default().push(snapshot);
        }
    }

    /// Number of values stored for `key`'s relation group.
    ///
    /// When the list is empty, any group member present at position 0 counts
    /// as one value, even if several members were written independently.
    pub fn related_len(&self, key: MediaKey) -> usize {
        let registry = self.registry().clone();
        let Some(group) = registry.related_keys(key) else {
            log::warn!("length of unregistered key {key:?}");
            return 0;
        };
        let rep = group[0];
        let list = self.extended.get(&rep).map_or(0, Vec::len);
        let zero_populated = group.iter().any(|member| self.attrs.contains(*member));
        if zero_populated {
            list + 1
        } else {
            list
        }
    }

    /// Snapshot of `key`'s group at `pos`. Position 0 reads the record's
    /// attributes; an out-of-range position logs and returns an empty
    /// snapshot.
    pub fn get_related(&self, key: MediaKey, pos: usize) -> GroupSnapshot {
        let registry = self.registry().clone();
        let Some(group) = registry.related_keys(key) else {
            log::warn!("get of unregistered key {key:?}");
            return GroupSnapshot::new();
        };
        let rep = group[0];
        if pos == 0 {
            let mut snapshot = GroupSnapshot::with_keys(group);
            for member in group {
                if let Some(value) = self.attrs.get(*member) {
                    snapshot.set(&registry, *member, value.clone());
                }
            }
            return snapshot;
        }
        match self.extended.get(&rep).and_then(|list| list.get(pos - 1)) {
            Some(snapshot) => snapshot.clone(),
            None => {
                log::warn!("position {pos} out of range for key {key:?}");
                GroupSnapshot::with_keys(group)
            }
        }
    }

    /// All present values of `key` itself (not the whole group), position 0
    /// first, then list order.
    pub fn all_values(&self, key: MediaKey) -> Vec<Value> {
        let Some(rep) = self.registry().representative(key) else {
            log::warn!("values of unregistered key {key:?}");
            return Vec::new();
        };
        let mut values = Vec::new();
        if let Some(value) = self.attrs.get(key) {
            values.push(value.clone());
        }
        if let Some(list) = self.extended.get(&rep) {
            for snapshot in list {
                if let Some(value) = snapshot.get(key) {
                    values.push(value.clone());
                }
            }
        }
        values
    }

    /// String-typed subset of [`Media::all_values`].
    pub fn all_string_values(&self, key: MediaKey) -> Vec<String> {
        self.all_values(key)
            .into_iter()
            .filter_map(|value| match value {
                Value::Str(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Removes the group value at `pos`. Removing position 0 promotes the
    /// first list entry into the record; an out-of-range position is a
    /// no-op.
    pub fn remove_related(&mut self, key: MediaKey, pos: usize) {
        let registry = self.registry().clone();
        let Some(group) = registry.related_keys(key).map(<[MediaKey]>::to_vec) else {
            log::warn!("remove of unregistered key {key:?}");
            return;
        };
        let rep = group[0];
        if pos == 0 {
            let promoted = match self.extended.get_mut(&rep) {
                Some(list) if !list.is_empty() => {
                    let head = list.remove(0);
                    if list.is_empty() {
                        self.extended.remove(&rep);
                    }
                    Some(head)
                }
                _ => None,
            };
            for member in &group {
                self.attrs.remove(*member);
            }
            if let Some(snapshot) = promoted {
                self.write_snapshot_at_zero(&snapshot);
            }
            return;
        }
        if let Some(list) = self.extended.get_mut(&rep) {
            if pos - 1 < list.len() {
                list.remove(pos - 1);
                if list.is_empty() {
                    self.extended.remove(&rep);
                }
            }
        }
    }

    /// Replaces the group value at `pos` with `snapshot`. Position 0
    /// overwrites the record's group fields; an out-of-range position logs
    /// and discards the snapshot. A snapshot carrying no values is logged
    /// and dropped, so an update can never leave a hole at a position.
    pub fn update_related(&mut self, snapshot: &GroupSnapshot, pos: usize) {
        let Some(first) = snapshot.first_key() else {
            log::warn!("ignoring update with an empty snapshot");
            return;
        };
        if snapshot.is_empty() {
            log::warn!("ignoring update with a snapshot carrying no values");
            return;
        }
        let registry = self.registry().clone();
        let Some(group) = registry.related_keys(first).map(<[MediaKey]>::to_vec) else {
            log::warn!("update of unregistered key {first:?}");
            return;
        };
        let rep = group[0];
        if pos == 0 {
            for member in &group {
                self.attrs.remove(*member);
            }
            self.write_snapshot_at_zero(snapshot);
            return;
        }
        match self.extended.get_mut(&rep) {
            Some(list) if pos - 1 < list.len() => list[pos - 1] = snapshot.clone(),
            _ => log::warn!("position {pos} out of range for key {first:?}, update discarded"),
        }
    }

    fn write_snapshot_at_zero(&mut self, snapshot: &GroupSnapshot) {
        let registry = self.registry().clone();
        for (key, value) in snapshot.iter() {
            self.attrs.set(&registry, key, value.clone());
        }
    }
}
