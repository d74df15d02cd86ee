use std::fmt;

/// The ten stages resolved by the registry.
///
/// Data-init is not listed: it is a device entry point that also binds the state buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SplitStage {
    PathInit,
    SceneIntersect,
    LampEmission,
    QueueEnqueue,
    BackgroundBufferUpdate,
    ShaderEval,
    HoldoutEmissionBlurringPathterminationAo,
    DirectLighting,
    ShadowBlocked,
    NextIterationSetup,
}

impl SplitStage {
    pub const COUNT: usize = 10;

    /// Resolution order.
    pub const ALL: [SplitStage; Self::COUNT] = [
        Self::PathInit,
        Self::SceneIntersect,
        Self::LampEmission,
        Self::QueueEnqueue,
        Self::BackgroundBufferUpdate,
        Self::ShaderEval,
        Self::HoldoutEmissionBlurringPathterminationAo,
        Self::DirectLighting,
        Self::ShadowBlocked,
        Self::NextIterationSetup,
    ];

    /// One path iteration. Each stage consumes the previous stage's output; never reorder.
    pub const PATH_ITERATION: [SplitStage; 9] = [
        Self::SceneIntersect,
        Self::LampEmission,
        Self::QueueEnqueue,
        Self::BackgroundBufferUpdate,
        Self::ShaderEval,
        Self::HoldoutEmissionBlurringPathterminationAo,
        Self::DirectLighting,
        Self::ShadowBlocked,
        Self::NextIterationSetup,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::PathInit => "path_init",
            Self::SceneIntersect => "scene_intersect",
            Self::LampEmission => "lamp_emission",
            Self::QueueEnqueue => "queue_enqueue",
            Self::BackgroundBufferUpdate => "background_buffer_update",
            Self::ShaderEval => "shader_eval",
            Self::HoldoutEmissionBlurringPathterminationAo => {
                "holdout_emission_blurring_pathtermination_ao"
            }
            Self::DirectLighting => "direct_lighting",
            Self::ShadowBlocked => "shadow_blocked",
            Self::NextIterationSetup => "next_iteration_setup",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// The shadow stage traces two rays per lane and runs on the doubled grid.
    pub fn uses_shadow_grid(self) -> bool {
        matches!(self, Self::ShadowBlocked)
    }
}

impl fmt::Display for SplitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
