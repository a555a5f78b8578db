//! The resource registry owns every shared resource of an engine.

use std::collections::HashMap;

use anyhow::Result;
use ash::vk;

use crate::backend::ResourceAllocator;
use crate::resource::{BackingHandle, ResourceDescription, ResourceDescriptor, ResourceId, ResourceState, ResourceType};
use crate::Error;

/// One entry in the registry arena.
#[derive(Debug)]
struct ResourceRecord {
    descriptor: ResourceDescriptor,
    extent: vk::Extent3D,
    /// One slot for most resources, one slot per frame in flight for per-frame buffers.
    backing: Vec<BackingHandle>,
    state: ResourceState,
    version: u32,
}

/// Owns all resource descriptors together with their runtime state and version counter.
///
/// Versions start at zero and persist for the lifetime of the registry. They only change through the
/// [`StateTracker`](crate::sync::tracker::StateTracker), right after it issued the transition for a write.
#[derive(Debug)]
pub struct ResourceRegistry {
    records: Vec<ResourceRecord>,
    names: HashMap<String, ResourceId>,
    surface_extent: vk::Extent2D,
    frames_in_flight: usize,
}

impl ResourceRegistry {
    /// Create an empty registry for a given surface extent and number of frames in flight.
    pub fn new(surface_extent: vk::Extent2D, frames_in_flight: usize) -> Self {
        Self {
            records: Vec::new(),
            names: HashMap::new(),
            surface_extent,
            frames_in_flight: frames_in_flight.max(1),
        }
    }

    /// Register a new resource. Backing memory is not allocated until [`ResourceRegistry::allocate_all`] is called.
    /// # Errors
    /// * Fails if a resource with the same name is already registered.
    /// * Fails if the extent policy is invalid, for example a relative scale outside of `(0, 16]`.
    pub fn register(&mut self, descriptor: ResourceDescriptor) -> Result<ResourceId> {
        if self.names.contains_key(descriptor.name()) {
            return Err(Error::DuplicateResource(descriptor.name().to_owned()).into());
        }
        if let Some(image) = descriptor.as_image() {
            if !image.extent.is_valid() {
                return Err(Error::InvalidExtent(descriptor.name().to_owned()).into());
            }
        }

        let id = ResourceId(self.records.len() as u32);
        let extent = self.resolve_extent(&descriptor);
        trace!("Registered resource `{}` as {:?}", descriptor.name(), id);
        self.names.insert(descriptor.name().to_owned(), id);
        self.records.push(ResourceRecord {
            descriptor,
            extent,
            backing: Vec::new(),
            state: ResourceState::UNDEFINED,
            version: 0,
        });
        Ok(id)
    }

    fn record(&self, id: ResourceId) -> Result<&ResourceRecord> {
        self.records
            .get(id.index())
            .ok_or_else(|| Error::UnknownResource(format!("{:?}", id)).into())
    }

    fn record_mut(&mut self, id: ResourceId) -> Result<&mut ResourceRecord> {
        self.records
            .get_mut(id.index())
            .ok_or_else(|| Error::UnknownResource(format!("{:?}", id)).into())
    }

    fn resolve_extent(&self, descriptor: &ResourceDescriptor) -> vk::Extent3D {
        match descriptor.description() {
            ResourceDescription::Image(image) => image.extent.resolve(self.surface_extent),
            ResourceDescription::Buffer(_) => vk::Extent3D::default(),
        }
    }

    /// Get the descriptor of a resource.
    pub fn resolve(&self, id: ResourceId) -> Result<&ResourceDescriptor> {
        Ok(&self.record(id)?.descriptor)
    }

    /// Look up a resource by its name.
    pub fn lookup(&self, name: &str) -> Result<ResourceId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownResource(name.to_owned()).into())
    }

    /// Whether this handle refers to a registered resource.
    pub fn contains(&self, id: ResourceId) -> bool {
        id.index() < self.records.len()
    }

    /// Name of a resource. Unknown handles are formatted instead, so this can be used in error messages.
    pub fn name(&self, id: ResourceId) -> String {
        self.record(id)
            .map(|record| record.descriptor.name().to_owned())
            .unwrap_or_else(|_| format!("{:?}", id))
    }

    /// Kind of a resource.
    pub fn ty(&self, id: ResourceId) -> Result<ResourceType> {
        Ok(self.record(id)?.descriptor.ty())
    }

    /// The number of times this resource has been written.
    pub fn version(&self, id: ResourceId) -> Result<u32> {
        Ok(self.record(id)?.version)
    }

    /// The last tracked state of this resource.
    pub fn state(&self, id: ResourceId) -> Result<ResourceState> {
        Ok(self.record(id)?.state)
    }

    /// The actual extent of an image. Buffers report an empty extent.
    pub fn extent(&self, id: ResourceId) -> Result<vk::Extent3D> {
        Ok(self.record(id)?.extent)
    }

    /// The backing handle used in a given frame. Only per-frame buffers have more than one slot.
    /// Returns [`BackingHandle::None`] if the resource has not been allocated yet.
    pub fn backing(&self, id: ResourceId, frame: usize) -> Result<BackingHandle> {
        let record = self.record(id)?;
        if record.backing.is_empty() {
            return Ok(BackingHandle::None);
        }
        Ok(record.backing[frame % record.backing.len()])
    }

    /// Current extent of the render surface.
    pub fn surface_extent(&self) -> vk::Extent2D {
        self.surface_extent
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no resources are registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over all resource handles in registration order.
    pub fn ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        (0..self.records.len() as u32).map(ResourceId)
    }

    pub(crate) fn set_state(&mut self, id: ResourceId, state: ResourceState) -> Result<()> {
        self.record_mut(id)?.state = state;
        Ok(())
    }

    /// Increment the version counter and return the new version.
    pub(crate) fn bump_version(&mut self, id: ResourceId) -> Result<u32> {
        let record = self.record_mut(id)?;
        record.version = record
            .version
            .checked_add(1)
            .ok_or_else(|| Error::VersionOverflow(record.descriptor.name().to_owned()))?;
        Ok(record.version)
    }

    fn allocate(&mut self, id: ResourceId, allocator: &mut dyn ResourceAllocator) -> Result<()> {
        let frames_in_flight = self.frames_in_flight;
        let record = self.record_mut(id)?;
        let backing = match record.descriptor.description() {
            ResourceDescription::Image(image) => {
                vec![allocator.create_image(record.descriptor.name(), image, record.extent)?]
            }
            ResourceDescription::Buffer(buffer) => {
                let slots = if buffer.per_frame { frames_in_flight } else { 1 };
                (0..slots)
                    .map(|_| allocator.create_buffer(record.descriptor.name(), buffer))
                    .collect::<Result<Vec<_>>>()?
            }
        };
        record.backing = backing;
        record.state = ResourceState::UNDEFINED;
        Ok(())
    }

    fn release(&mut self, id: ResourceId, allocator: &mut dyn ResourceAllocator) -> Result<()> {
        let record = self.record_mut(id)?;
        for handle in record.backing.drain(..) {
            allocator.destroy(handle)?;
        }
        record.state = ResourceState::UNDEFINED;
        Ok(())
    }

    /// Create backing memory for every resource that does not have any yet.
    pub fn allocate_all(&mut self, allocator: &mut dyn ResourceAllocator) -> Result<()> {
        let pending = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.backing.is_empty())
            .map(|(index, _)| ResourceId(index as u32))
            .collect::<Vec<_>>();
        for id in pending {
            self.allocate(id, allocator)?;
        }
        Ok(())
    }

    /// Resize the render surface. Every surface-relative resource is destroyed and re-created at its new extent,
    /// and its tracked state is reset. Versions are kept. Returns the re-created resources, which need their initial
    /// state established again.
    pub fn resize(&mut self, extent: vk::Extent2D, allocator: &mut dyn ResourceAllocator) -> Result<Vec<ResourceId>> {
        self.surface_extent = extent;
        let relative = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.descriptor.is_surface_relative())
            .map(|(index, _)| ResourceId(index as u32))
            .collect::<Vec<_>>();
        for &id in &relative {
            let allocated = !self.record(id)?.backing.is_empty();
            if allocated {
                self.release(id, allocator)?;
            }
            let new_extent = self.resolve_extent(&self.record(id)?.descriptor);
            self.record_mut(id)?.extent = new_extent;
            if allocated {
                self.allocate(id, allocator)?;
            }
        }
        info!(
            "Resized surface to {}x{}, re-created {} resource(s)",
            extent.width,
            extent.height,
            relative.len()
        );
        Ok(relative)
    }

    /// Destroy the backing memory of every resource. Descriptors, versions and handles stay valid.
    pub fn release_all(&mut self, allocator: &mut dyn ResourceAllocator) -> Result<()> {
        for id in self.ids().collect::<Vec<_>>() {
            self.release(id, allocator)?;
        }
        Ok(())
    }
}
