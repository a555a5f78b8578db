//! The command context is the seam between strata and whatever records GPU commands.
//!
//! The execution engine records a whole frame into a single [`CommandContext`]: transitions, initial clears, the
//! final composite blit, and everything the passes record in [`RenderPass::execute`](crate::RenderPass::execute).
//! The Vulkan backend implements this on top of a `VkCommandBuffer`. [`CommandRecorder`] keeps every command in memory
//! instead, which is what the headless backend and the test suite use.

use anyhow::Result;
use ash::vk;

use crate::resource::{BackingHandle, InitialValue};
use crate::sync::transition::Transition;

/// A single stream of GPU commands.
pub trait CommandContext {
    /// Record a resource state transition.
    fn transition(&mut self, transition: &Transition) -> Result<()>;
    /// Clear an image in [`vk::ImageLayout::TRANSFER_DST_OPTIMAL`] to a value.
    fn clear_image(&mut self, image: &BackingHandle, value: &InitialValue) -> Result<()>;
    /// Blit a whole image in `TRANSFER_SRC_OPTIMAL` layout onto a whole image in `TRANSFER_DST_OPTIMAL` layout.
    fn blit_image(&mut self, src: &BackingHandle, dst: &BackingHandle) -> Result<()>;
    /// Open a debug label.
    fn begin_label(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }
    /// Close the last opened debug label.
    fn end_label(&mut self) -> Result<()> {
        Ok(())
    }
    /// Insert a single debug label.
    fn insert_label(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }
    /// Raw command buffer handle, for passes that record their own Vulkan commands.
    /// This is null if the context is not backed by a Vulkan command buffer.
    fn handle(&self) -> vk::CommandBuffer {
        vk::CommandBuffer::null()
    }
}

/// A command kept by a [`CommandRecorder`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// A resource transition
    Transition(Transition),
    /// An image clear
    Clear {
        /// Cleared image
        image: BackingHandle,
        /// Clear value
        value: InitialValue,
    },
    /// A whole-image blit
    Blit {
        /// Source image
        src: BackingHandle,
        /// Destination image
        dst: BackingHandle,
    },
    /// Start of a debug label
    BeginLabel(String),
    /// End of a debug label
    EndLabel,
    /// A single debug label
    Label(String),
}

/// Command context that records commands in memory.
#[derive(Debug, Default, Clone)]
pub struct CommandRecorder {
    commands: Vec<RecordedCommand>,
}

impl CommandRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded commands, in order.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Only the recorded transitions, in order.
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.commands.iter().filter_map(|command| match command {
            RecordedCommand::Transition(transition) => Some(transition),
            _ => None,
        })
    }

    /// Take all recorded commands, leaving the recorder empty.
    pub fn take(&mut self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl CommandContext for CommandRecorder {
    fn transition(&mut self, transition: &Transition) -> Result<()> {
        self.commands.push(RecordedCommand::Transition(*transition));
        Ok(())
    }

    fn clear_image(&mut self, image: &BackingHandle, value: &InitialValue) -> Result<()> {
        self.commands.push(RecordedCommand::Clear {
            image: *image,
            value: *value,
        });
        Ok(())
    }

    fn blit_image(&mut self, src: &BackingHandle, dst: &BackingHandle) -> Result<()> {
        self.commands.push(RecordedCommand::Blit {
            src: *src,
            dst: *dst,
        });
        Ok(())
    }

    fn begin_label(&mut self, name: &str) -> Result<()> {
        self.commands.push(RecordedCommand::BeginLabel(name.to_owned()));
        Ok(())
    }

    fn end_label(&mut self) -> Result<()> {
        self.commands.push(RecordedCommand::EndLabel);
        Ok(())
    }

    fn insert_label(&mut self, name: &str) -> Result<()> {
        self.commands.push(RecordedCommand::Label(name.to_owned()));
        Ok(())
    }
}
