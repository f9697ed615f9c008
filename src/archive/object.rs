//! Objects: the nodes of an archive's hierarchy

use std::sync::Arc;

use log::trace;

use super::ArchiveContext;
use super::header::{ObjectHeader, PropertyHeader, read_object_headers};
use super::metadata::MetaData;
use super::property::CompoundProperty;
use super::time_sampling::TimeSampling;
use crate::error::{Error, Result};
use crate::ogawa::Group;

/// A node in the archive hierarchy
///
/// Group child 0 holds the properties, children `1..=n` the child objects and
/// the last child the child headers. Children are opened on demand.
pub struct Object {
    header: ObjectHeader,
    group: Group,
    // Group positions from the top object down to this one
    lineage: Vec<u64>,
    children: Vec<ObjectHeader>,
    properties: CompoundProperty,
    ctx: Arc<ArchiveContext>,
}

impl Object {
    pub(crate) fn load(
        header: ObjectHeader,
        group: Group,
        mut lineage: Vec<u64>,
        ctx: Arc<ArchiveContext>,
    ) -> Result<Self> {
        if group.pos() != 0 {
            if lineage.contains(&group.pos()) {
                return Err(Error::CyclicHierarchy(header.full_name));
            }
            lineage.push(group.pos());
        }

        let count = group.num_children();

        let children = if count > 0 && group.is_child_data(count - 1)? {
            read_object_headers(
                group.data(count - 1)?.as_slice(),
                &header.full_name,
                &ctx.indexed_metadata,
            )?
        } else {
            Vec::new()
        };

        let properties_group = if count > 0 && group.is_child_group(0)? {
            group.group(0)?
        } else {
            Group::empty()
        };
        let properties = CompoundProperty::load(
            PropertyHeader::compound("", header.metadata.clone()),
            properties_group,
            ctx.clone(),
        )?;

        trace!(
            "Loaded object {} ({} children, {} properties)",
            header.full_name,
            children.len(),
            properties.num_properties()
        );

        Ok(Self {
            header,
            group,
            lineage,
            children,
            properties,
            ctx,
        })
    }

    /// The object's header
    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Slash-separated path from the root
    pub fn full_name(&self) -> &str {
        &self.header.full_name
    }

    /// Object metadata
    pub fn metadata(&self) -> &MetaData {
        &self.header.metadata
    }

    /// The object's top-level properties
    pub fn properties(&self) -> &CompoundProperty {
        &self.properties
    }

    /// Number of child objects
    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    /// Headers of the child objects, without opening them
    pub fn child_headers(&self) -> &[ObjectHeader] {
        &self.children
    }

    /// Open child object `index`
    pub fn child(&self, index: usize) -> Result<Object> {
        let header = self
            .children
            .get(index)
            .cloned()
            .ok_or(Error::ChildOutOfBounds {
                index: index as u64,
                count: self.children.len() as u64,
            })?;
        let group = self.group.group(index as u64 + 1)?;
        Object::load(header, group, self.lineage.clone(), self.ctx.clone())
    }

    /// Open the child called `name`, if present
    pub fn child_by_name(&self, name: &str) -> Result<Option<Object>> {
        match self.children.iter().position(|h| h.name == name) {
            Some(index) => self.child(index).map(Some),
            None => Ok(None),
        }
    }

    /// Iterate over the child objects in storage order
    pub fn children(&self) -> impl Iterator<Item = Result<Object>> + '_ {
        (0..self.children.len()).map(move |i| self.child(i))
    }

    /// Time sampling `index` of the owning archive
    pub fn time_sampling(&self, index: u32) -> Option<&TimeSampling> {
        self.ctx.time_samplings.get(index as usize).map(|(ts, _)| ts)
    }
}
