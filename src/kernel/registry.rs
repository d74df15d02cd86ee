use crate::device::capability::{KernelStageHandle, SplitDevice};
use crate::foundation::error::{SplitError, SplitResult};
use crate::kernel::features::RequestedFeatures;
use crate::kernel::stage::SplitStage;

/// Resolved handles for every [`SplitStage`], indexed by stage.
///
/// A registry only exists fully populated: [`StageRegistry::load`] resolves every stage before
/// it returns, so replacing a registry is all-or-nothing.
#[derive(Clone, Debug)]
pub struct StageRegistry {
    handles: [KernelStageHandle; SplitStage::COUNT],
    features: RequestedFeatures,
}

impl StageRegistry {
    #[tracing::instrument(skip(device, features), fields(device = device.name()))]
    pub fn load<D: SplitDevice + ?Sized>(
        device: &mut D,
        features: &RequestedFeatures,
    ) -> SplitResult<Self> {
        tracing::debug!(build_options = %features.build_options(), "resolving split stages");

        let mut resolved = Vec::with_capacity(SplitStage::COUNT);
        for stage in SplitStage::ALL {
            let handle = device
                .get_split_kernel_function(stage.name(), features)
                .ok_or_else(|| {
                    SplitError::unsupported(format!(
                        "split kernel error: failed to load kernel_{stage}"
                    ))
                })?;
            resolved.push(handle);
        }

        let handles: [KernelStageHandle; SplitStage::COUNT] =
            resolved.try_into().map_err(|v: Vec<KernelStageHandle>| {
                SplitError::unsupported(format!(
                    "expected {} split stages, resolved {}",
                    SplitStage::COUNT,
                    v.len()
                ))
            })?;

        Ok(Self {
            handles,
            features: features.clone(),
        })
    }

    pub fn handle(&self, stage: SplitStage) -> &KernelStageHandle {
        &self.handles[stage.index()]
    }

    pub fn max_closure(&self) -> u32 {
        self.features.max_closure
    }

    pub fn features(&self) -> &RequestedFeatures {
        &self.features
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/registry.rs"]
mod tests;
