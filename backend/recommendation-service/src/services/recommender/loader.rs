//! Reads the interaction data file written by the data writer.
//!
//! Accepted lines: `user_id<sep>item_id` where `<sep>` is `,` or a tab.
//! Blank lines and lines starting with `#` are ignored. Anything else is a
//! malformed dataset.

use crate::error::{AppError, Result};
use crate::models::{Interaction, ItemId, UserId};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use tracing::info;

/// Immutable set of implicit preferences, grouped by user.
#[derive(Debug, Clone, Default)]
pub struct InteractionDataset {
    user_items: BTreeMap<UserId, BTreeSet<ItemId>>,
    items: BTreeSet<ItemId>,
    interactions: usize,
}

impl InteractionDataset {
    pub fn from_interactions(interactions: impl IntoIterator<Item = Interaction>) -> Self {
        let mut dataset = Self::default();
        for interaction in interactions {
            dataset.insert(interaction.user_id, interaction.item_id);
        }
        dataset
    }

    fn insert(&mut self, user_id: UserId, item_id: ItemId) {
        if self.user_items.entry(user_id).or_default().insert(item_id) {
            self.interactions += 1;
        }
        self.items.insert(item_id);
    }

    pub fn num_users(&self) -> usize {
        self.user_items.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// Distinct (user, item) pairs
    pub fn num_interactions(&self) -> usize {
        self.interactions
    }

    pub fn is_empty(&self) -> bool {
        self.interactions == 0
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.user_items.contains_key(&user_id)
    }

    pub fn items_of(&self, user_id: UserId) -> Option<&BTreeSet<ItemId>> {
        self.user_items.get(&user_id)
    }

    /// Users in ascending id order with their item sets
    pub fn users(&self) -> impl Iterator<Item = (UserId, &BTreeSet<ItemId>)> {
        self.user_items.iter().map(|(user, items)| (*user, items))
    }

    pub fn interactions(&self) -> impl Iterator<Item = Interaction> + '_ {
        self.user_items.iter().flat_map(|(user_id, items)| {
            items.iter().map(move |item_id| Interaction {
                user_id: *user_id,
                item_id: *item_id,
            })
        })
    }
}

pub fn load_dataset(path: &Path) -> Result<InteractionDataset> {
    let file = File::open(path).map_err(|e| {
        let reason = if e.kind() == ErrorKind::NotFound {
            "not found".to_string()
        } else {
            e.to_string()
        };
        AppError::ModelBuild(format!(
            "cannot open interaction data {}: {}",
            path.display(),
            reason
        ))
    })?;

    let dataset = parse_dataset(BufReader::new(file))?;

    info!(
        path = %path.display(),
        users = dataset.num_users(),
        items = dataset.num_items(),
        interactions = dataset.num_interactions(),
        "Interaction data loaded"
    );

    Ok(dataset)
}

pub fn parse_dataset<R: BufRead>(reader: R) -> Result<InteractionDataset> {
    let mut dataset = InteractionDataset::default();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|e| {
            AppError::ModelBuild(format!("unreadable interaction data at line {}: {}", line_no, e))
        })?;

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (user_id, item_id) = parse_record(trimmed).ok_or_else(|| {
            AppError::ModelBuild(format!(
                "malformed interaction at line {}: {:?}",
                line_no, trimmed
            ))
        })?;
        dataset.insert(user_id, item_id);
    }

    Ok(dataset)
}

fn parse_record(line: &str) -> Option<(UserId, ItemId)> {
    let mut fields = line.split(|c| c == ',' || c == '\t');
    let user_id = fields.next()?.trim().parse::<UserId>().ok()?;
    let item_id = fields.next()?.trim().parse::<ItemId>().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((user_id, item_id))
}
