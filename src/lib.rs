pub mod behaviors;
pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod perception;
pub mod platform;

use crate::behaviors::MotionService;
use crate::error::Result;
use crate::lifecycle::LifecycleNode;

/// Core of the gyro-stabilised drive: owns the lifecycle components
pub struct GyroDriveCore {
    components: Vec<Box<dyn LifecycleNode>>,
}

impl GyroDriveCore {
    /// Create a new instance of GyroDriveCore
    pub fn new() -> Self {
        GyroDriveCore {
            components: Vec::new(),
        }
    }

    /// Register a component with the core
    pub fn register<T: LifecycleNode + 'static>(&mut self, component: T) {
        self.components.push(Box::new(component));
    }

    /// Configure and activate all registered components, in registration order
    pub fn init(&mut self) -> Result<()> {
        for component in &mut self.components {
            component.on_configure()?;
            component.on_activate()?;
        }
        Ok(())
    }

    /// Deactivate and clean up all registered components, newest first
    pub fn shutdown(&mut self) -> Result<()> {
        for component in self.components.iter_mut().rev() {
            component.on_deactivate()?;
            component.on_cleanup()?;
        }
        Ok(())
    }

    /// Get the registered motion service
    pub fn motion_service_mut(&mut self) -> Option<&mut MotionService> {
        self.components
            .iter_mut()
            .find_map(|component| component.as_any_mut().downcast_mut::<MotionService>())
    }
}

impl Default for GyroDriveCore {
    fn default() -> Self {
        Self::new()
    }
}
