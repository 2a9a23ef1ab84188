//! Channel layouts: named groups of channel indices ordered by depth.
//!
//! A layout is stored on disk as a flat JSON object mapping group names to
//! integer arrays, for example `{"left": [3, 1, 0, 2], "right": [7, 5, 4, 6]}`.

use crate::{LfpError, LfpResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Group name of the left-hemisphere probe.
pub const LEFT: &str = "left";
/// Group name of the right-hemisphere probe.
pub const RIGHT: &str = "right";

/// Mapping from group name to an ordered list of channel indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelLayout {
    groups: BTreeMap<String, Vec<usize>>,
}

impl ChannelLayout {
    /// Creates a layout from an existing group map.
    pub const fn new(groups: BTreeMap<String, Vec<usize>>) -> Self {
        Self { groups }
    }

    /// Creates a layout with only `left` and `right` groups.
    pub fn sides(left: Vec<usize>, right: Vec<usize>) -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(LEFT.to_string(), left);
        groups.insert(RIGHT.to_string(), right);
        Self { groups }
    }

    /// Returns the whole group map.
    pub const fn groups(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.groups
    }

    /// Returns the channel indices of `name`, if the group exists.
    pub fn group(&self, name: &str) -> Option<&[usize]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    /// Returns the channel indices of `name` or an [`LfpError::InvalidArgument`].
    pub fn require_group(&self, name: &str) -> LfpResult<&[usize]> {
        self.group(name).ok_or_else(|| {
            let known: Vec<&str> = self.groups.keys().map(String::as_str).collect();
            LfpError::invalid_argument(format!(
                "unknown channel group '{name}' (known groups: {known:?})"
            ))
        })
    }

    /// Adds or replaces a group, returning the previous indices if any.
    pub fn insert_group(
        &mut self,
        name: impl Into<String>,
        channels: Vec<usize>,
    ) -> Option<Vec<usize>> {
        self.groups.insert(name.into(), channels)
    }

    /// Number of groups in the layout.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if the layout has no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Checks that every index refers to one of `num_channels` channels.
    pub fn validate(&self, num_channels: usize) -> LfpResult<()> {
        for (name, channels) in &self.groups {
            if let Some(&bad) = channels.iter().find(|&&c| c >= num_channels) {
                return Err(LfpError::validation(format!(
                    "channel group '{name}' references channel {bad}, but the recording has {num_channels} channels"
                )));
            }
        }
        Ok(())
    }

    /// Parses a layout from a JSON document.
    pub fn from_json_str(json: &str) -> LfpResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the layout to a JSON document.
    pub fn to_json_string(&self) -> LfpResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Loads a channel layout from a JSON file.
pub fn load_channel_layout<P: AsRef<Path>>(path: P) -> LfpResult<ChannelLayout> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let layout: ChannelLayout = serde_json::from_reader(reader)?;
    tracing::debug!(path = %path.display(), groups = layout.len(), "loaded channel layout");
    Ok(layout)
}

/// Saves a channel layout to a JSON file, replacing any existing file.
pub fn save_channel_layout<P: AsRef<Path>>(layout: &ChannelLayout, path: P) -> LfpResult<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, layout)?;
    writer.flush()?;
    tracing::debug!(path = %path.display(), groups = layout.len(), "saved channel layout");
    Ok(())
}
