//! The apply/update orchestrator: merges documents, detects conflicts
//! against other field managers, prunes dropped fields, and keeps the
//! ownership records current.

use super::conflict::{Conflict, Conflicts};
use super::managed::{ManagedFields, Operation, OwnedFields};
use crate::error::{Error, Result};
use crate::fieldpath::Set;
use crate::typed::{Comparison, TypedValue};

/// Updater drives server-side apply and plain updates over one
/// object's ownership records.
#[derive(Debug, Default)]
pub struct Updater {
    /// Timestamp recorded on ownership entries whose field set
    /// changes. Entries whose set is untouched keep their old time.
    pub now: Option<String>,
}

impl Updater {
    pub fn new() -> Self {
        Updater::default()
    }

    pub fn with_time(now: impl Into<String>) -> Self {
        Updater {
            now: Some(now.into()),
        }
    }

    /// Server-side apply: merges `config` into `live` on behalf of
    /// `manager`.
    ///
    /// Fields the manager owned last time but dropped from `config`
    /// are pruned from the result unless another manager also owns
    /// them. Changing a field owned by someone else is a conflict
    /// unless `force` is set, in which case ownership transfers.
    ///
    /// Returns `None` when the apply changes neither the object nor
    /// any ownership record.
    pub fn apply(
        &self,
        live: &TypedValue,
        config: &TypedValue,
        api_version: &str,
        managers: &mut ManagedFields,
        manager: &str,
        force: bool,
    ) -> Result<Option<TypedValue>> {
        let before = managers.clone();

        let merged = live.merge(config)?;
        let config_set = config.to_field_set()?;

        let last = managers.get(manager).cloned();
        let time = match &last {
            Some(entry) if entry.set == config_set => entry.time.clone(),
            _ => self.now.clone(),
        };
        managers.insert(
            manager,
            OwnedFields {
                operation: Operation::Apply,
                api_version: api_version.to_string(),
                time,
                set: config_set.clone(),
            },
        );

        // Prune fields this manager dropped from its config, unless a
        // different manager also owns them.
        let pruned = match &last {
            Some(entry) => {
                let dropped = entry.set.difference(&config_set);
                if dropped.is_empty() {
                    merged
                } else {
                    let mut to_remove = Set::new();
                    for path in dropped.leaves() {
                        let owned_elsewhere = managers
                            .iter()
                            .any(|(name, other)| name != manager && other.set.has(&path));
                        if !owned_elsewhere {
                            to_remove.insert(&path);
                        }
                    }
                    merged.remove_items(&to_remove)
                }
            }
            None => merged,
        };

        let compare = match self.update_ownership(live, &pruned, managers, manager, force) {
            Ok(compare) => compare,
            Err(err) => {
                // Roll the manager entry back before surfacing the
                // conflict.
                match last {
                    Some(entry) => managers.insert(manager, entry),
                    None => {
                        managers.remove(manager);
                    }
                }
                return Err(err);
            }
        };

        if compare.is_same() && *managers == before {
            return Ok(None);
        }
        Ok(Some(pruned))
    }

    /// Plain update on behalf of `manager`: never conflicts, takes
    /// ownership of everything it changed, and releases ownership of
    /// what it removed.
    pub fn update(
        &self,
        live: &TypedValue,
        new: &TypedValue,
        api_version: &str,
        managers: &mut ManagedFields,
        manager: &str,
    ) -> Result<()> {
        let compare = self.update_ownership(live, new, managers, manager, true)?;
        if compare.is_same() {
            return Ok(());
        }

        let current = managers
            .get(manager)
            .map(|entry| entry.set.clone())
            .unwrap_or_default();
        let new_set = current
            .difference(&compare.removed)
            .union(&compare.modified)
            .union(&compare.added);

        if new_set.is_empty() {
            managers.remove(manager);
        } else {
            managers.insert(
                manager,
                OwnedFields {
                    operation: Operation::Update,
                    api_version: api_version.to_string(),
                    time: self.now.clone(),
                    set: new_set,
                },
            );
        }
        Ok(())
    }

    /// Compares `live` with `new` and reconciles every other manager's
    /// ownership against the change: changed fields they own are
    /// conflicts (or forcibly taken), removed fields leave their sets.
    fn update_ownership(
        &self,
        live: &TypedValue,
        new: &TypedValue,
        managers: &mut ManagedFields,
        workflow: &str,
        force: bool,
    ) -> Result<Comparison> {
        let compare = live.compare(new)?;
        let changed = compare.modified.union(&compare.added);

        let mut conflicts = Conflicts::new();
        for (manager, entry) in managers.iter() {
            if manager == workflow {
                continue;
            }
            let conflict_set = entry.set.intersection(&changed);
            conflict_set.iterate(|path| {
                conflicts.add(Conflict::new(manager.clone(), path.clone()));
            });
        }

        if !conflicts.is_empty() && !force {
            return Err(Error::Conflict(conflicts));
        }

        let taken = conflicts.to_set();
        let mut rewritten: Vec<(String, OwnedFields)> = Vec::new();
        for (manager, entry) in managers.iter() {
            if manager == workflow {
                continue;
            }
            let stripped = entry.set.difference(&taken).difference(&compare.removed);
            if stripped != entry.set {
                let mut entry = entry.clone();
                entry.set = stripped;
                rewritten.push((manager.clone(), entry));
            }
        }
        for (manager, entry) in rewritten {
            managers.insert(manager, entry);
        }
        managers.remove_empty();

        Ok(compare)
    }
}
