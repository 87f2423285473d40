//! Entity types shared by the storage integration tests.

use linkstore_foundation::{EntityId, EntitySource, EntityTypeId, PersistentId};
use linkstore_storage::{EntityData, SoftLinkable};

pub fn source() -> EntitySource {
    EntitySource::new("integration")
}

/// Persistent id of a [`NamedEntity`].
pub fn name_id(name: &str) -> PersistentId {
    PersistentId::new(NamedEntity::TYPE, name)
}

/// Entity addressable by name.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedEntity {
    pub name: String,
    pub payload: u32,
}

impl NamedEntity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            payload: 0,
        }
    }
}

impl EntityData for NamedEntity {
    const TYPE: EntityTypeId = EntityTypeId::new(1);

    fn persistent_id(&self) -> Option<PersistentId> {
        Some(name_id(&self.name))
    }
}

/// Entity holding exactly one soft link.
#[derive(Clone, Debug, PartialEq)]
pub struct WithSoftLinkEntity {
    pub link: PersistentId,
}

impl WithSoftLinkEntity {
    pub fn new(target: &str) -> Self {
        Self {
            link: name_id(target),
        }
    }
}

impl SoftLinkable for WithSoftLinkEntity {
    fn links(&self) -> Vec<PersistentId> {
        vec![self.link.clone()]
    }

    fn update_link(&mut self, old: &PersistentId, new: &PersistentId) -> bool {
        if &self.link != old {
            return false;
        }
        self.link = new.clone();
        true
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

/// Entity holding any number of optional soft links.
#[derive(Clone, Debug, PartialEq)]
pub struct Dependencies {
    pub links: Vec<PersistentId>,
}

impl Dependencies {
    pub fn on(targets: &[&str]) -> Self {
        Self {
            links: targets.iter().map(|t| name_id(t)).collect(),
        }
    }
}

impl SoftLinkable for Dependencies {
    fn links(&self) -> Vec<PersistentId> {
        self.links.clone()
    }

    fn update_link(&mut self, old: &PersistentId, new: &PersistentId) -> bool {
        let mut changed = false;
        for link in self.links.iter_mut().filter(|l| *l == old) {
            *link = new.clone();
            changed = true;
        }
        changed
    }

    fn remove_link(&mut self, link: &PersistentId) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l != link);
        before != self.links.len()
    }
}

impl EntityData for Dependencies {
    const TYPE: EntityTypeId = EntityTypeId::new(3);

    fn soft_linkable(&self) -> Option<&dyn SoftLinkable> {
        Some(self)
    }

    fn soft_linkable_mut(&mut self) -> Option<&mut dyn SoftLinkable> {
        Some(self)
    }
}

/// Entity owned by another entity.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedEntity {
    pub owner: EntityId,
    pub label: String,
}

impl OwnedEntity {
    pub fn new(owner: EntityId, label: &str) -> Self {
        Self {
            owner,
            label: label.to_string(),
        }
    }
}

impl EntityData for OwnedEntity {
    const TYPE: EntityTypeId = EntityTypeId::new(4);

    fn parent(&self) -> Option<EntityId> {
        Some(self.owner)
    }
}

/// Persistent id of a [`ModuleLibrary`].
pub fn library_id(module: &str, name: &str) -> PersistentId {
    PersistentId::compose(ModuleLibrary::TYPE, &[module, name])
}

/// Library scoped by a module; its persistent id embeds the module name.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleLibrary {
    pub module: PersistentId,
    pub name: String,
}

impl ModuleLibrary {
    pub fn new(module: &str, name: &str) -> Self {
        Self {
            module: name_id(module),
            name: name.to_string(),
        }
    }
}

impl SoftLinkable for ModuleLibrary {
    fn links(&self) -> Vec<PersistentId> {
        vec![self.module.clone()]
    }

    fn update_link(&mut self, old: &PersistentId, new: &PersistentId) -> bool {
        if &self.module != old {
            return false;
        }
        self.module = new.clone();
        true
    }
}

impl EntityData for ModuleLibrary {
    const TYPE: EntityTypeId = EntityTypeId::new(5);

    fn persistent_id(&self) -> Option<PersistentId> {
        Some(PersistentId::compose(
            Self::TYPE,
            &[self.module.name(), self.name.as_str()],
        ))
    }

    fn soft_linkable(&self) -> Option<&dyn SoftLinkable> {
        Some(self)
    }

    fn soft_linkable_mut(&mut self) -> Option<&mut dyn SoftLinkable> {
        Some(self)
    }
}
