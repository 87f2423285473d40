//! Entity types shared by the unit tests of this crate.

use linkstore_foundation::{EntityId, EntityTypeId, PersistentId};

use crate::data::{EntityData, SoftLinkable};

pub(crate) fn name_id(name: &str) -> PersistentId {
    PersistentId::new(NamedEntity::TYPE, name)
}

/// Entity addressable by name.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct NamedEntity {
    pub(crate) name: String,
    pub(crate) version: u32,
}

impl NamedEntity {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: 0,
        }
    }
}

impl EntityData for NamedEntity {
    const TYPE: EntityTypeId = EntityTypeId::new(1);

    fn persistent_id(&self) -> Option<PersistentId> {
        Some(name_id(&self.name))
    }
}

/// Entity holding soft links to named entities.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct WithSoftLinkEntity {
    pub(crate) links: Vec<PersistentId>,
}

impl WithSoftLinkEntity {
    pub(crate) fn new(target: &str) -> Self {
        Self {
            links: vec![name_id(target)],
        }
    }

    pub(crate) fn many(targets: &[&str]) -> Self {
        Self {
            links: targets.iter().map(|t| name_id(t)).collect(),
        }
    }
}

impl SoftLinkable for WithSoftLinkEntity {
    fn links(&self) -> Vec<PersistentId> {
        self.links.clone()
    }

    fn update_link(&mut self, old: &PersistentId, new: &PersistentId) -> bool {
        let mut changed = false;
        for link in &mut self.links {
            if link == old {
                *link = new.clone();
                changed = true;
            }
        }
        changed
    }

    fn remove_link(&mut self, link: &PersistentId) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l != link);
        self.links.len() != before
    }
}

impl EntityData for WithSoftLinkEntity {
    const TYPE: EntityTypeId = EntityTypeId::new(2);

    fn soft_linkable(&self) -> Option<&dyn SoftLinkable> {
        Some(self)
    }

    fn soft_linkable_mut(&mut self) -> Option<&mut dyn SoftLinkable> {
        Some(self)
    }
}

/// Entity owned by another entity.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ChildEntity {
    pub(crate) parent: EntityId,
    pub(crate) label: String,
}

impl ChildEntity {
    pub(crate) fn new(parent: EntityId, label: &str) -> Self {
        Self {
            parent,
            label: label.to_string(),
        }
    }
}

impl EntityData for ChildEntity {
    const TYPE: EntityTypeId = EntityTypeId::new(3);

    fn parent(&self) -> Option<EntityId> {
        Some(self.parent)
    }
}
