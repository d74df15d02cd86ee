use crate::foundation::error::{SplitError, SplitResult};

/// Number of lane queues maintained by the queue-enqueue stage.
pub const NUM_QUEUES: u64 = 4;
/// Lanes per work-pool group on GPU devices.
pub const WORK_POOL_SIZE_GPU: u32 = 64;
/// Lanes per work-pool group on CPU devices.
pub const WORK_POOL_SIZE_CPU: u32 = 1;

/// Byte sizes of the element types stored in the split state buffer.
///
/// The real sizes are dictated by the compiled stage code; the defaults match the layout of
/// the reference stage pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ElementSizes {
    pub float3: u64,
    pub scalar: u64,
    pub ray: u64,
    pub path_state: u64,
    pub intersection: u64,
    pub bsdf_eval: u64,
    pub path_radiance: u64,
    pub shader_closure: u64,
    /// `ShaderData` without its closure array.
    pub shader_data_base: u64,
    pub debug_data: u64,
}

impl Default for ElementSizes {
    fn default() -> Self {
        Self {
            float3: 16,
            scalar: 4,
            ray: 48,
            path_state: 64,
            intersection: 24,
            bsdf_eval: 112,
            path_radiance: 304,
            shader_closure: 80,
            shader_data_base: 736,
            debug_data: 16,
        }
    }
}

impl ElementSizes {
    /// Per-lane size of one shading state for `max_closures` closures; `None` on overflow.
    pub fn shader_data_size(&self, max_closures: u32) -> Option<u64> {
        u64::from(max_closures)
            .checked_mul(self.shader_closure)?
            .checked_add(self.shader_data_base)
    }

    pub fn validate(&self) -> SplitResult<()> {
        let fields = [
            ("float3", self.float3),
            ("scalar", self.scalar),
            ("ray", self.ray),
            ("path_state", self.path_state),
            ("intersection", self.intersection),
            ("bsdf_eval", self.bsdf_eval),
            ("path_radiance", self.path_radiance),
            ("shader_closure", self.shader_closure),
            ("shader_data_base", self.shader_data_base),
            ("debug_data", self.debug_data),
        ];
        for (name, v) in fields {
            if v == 0 {
                return Err(SplitError::config(format!(
                    "element size '{name}' must be > 0"
                )));
            }
        }
        Ok(())
    }
}

/// Element type of a fixed schema entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ElementKind {
    Float3,
    Scalar,
    Ray,
    PathState,
    Intersection,
    BsdfEval,
    PathRadiance,
    DebugData,
}

impl ElementKind {
    pub(crate) fn size(self, sizes: &ElementSizes) -> u64 {
        match self {
            Self::Float3 => sizes.float3,
            Self::Scalar => sizes.scalar,
            Self::Ray => sizes.ray,
            Self::PathState => sizes.path_state,
            Self::Intersection => sizes.intersection,
            Self::BsdfEval => sizes.bsdf_eval,
            Self::PathRadiance => sizes.path_radiance,
            Self::DebugData => sizes.debug_data,
        }
    }
}

/// Named sub-array of the split state buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateField {
    Rng,
    Throughput,
    LTransparent,
    PathRadiance,
    Ray,
    PathState,
    Isect,
    AoAlpha,
    AoBsdf,
    AoLightRay,
    BsdfEval,
    IsLamp,
    LightRay,
    IsectShadow,
    QueueData,
    WorkArray,
    DebugData,
    ShaderData,
    ShadowShaderData,
    PerThreadOutput,
}

impl StateField {
    pub fn name(self) -> &'static str {
        match self {
            Self::Rng => "rng",
            Self::Throughput => "throughput",
            Self::LTransparent => "l_transparent",
            Self::PathRadiance => "path_radiance",
            Self::Ray => "ray",
            Self::PathState => "path_state",
            Self::Isect => "isect",
            Self::AoAlpha => "ao_alpha",
            Self::AoBsdf => "ao_bsdf",
            Self::AoLightRay => "ao_light_ray",
            Self::BsdfEval => "bsdf_eval",
            Self::IsLamp => "is_lamp",
            Self::LightRay => "light_ray",
            Self::IsectShadow => "isect_shadow",
            Self::QueueData => "queue_data",
            Self::WorkArray => "work_array",
            Self::DebugData => "debug_data",
            Self::ShaderData => "sd",
            Self::ShadowShaderData => "sd_dl_shadow",
            Self::PerThreadOutput => "per_thread_output",
        }
    }
}

/// One fixed entry: field, element type, elements per lane.
pub(crate) struct FixedEntry {
    pub(crate) field: StateField,
    pub(crate) kind: ElementKind,
    pub(crate) per_lane: u64,
}

const fn entry(field: StateField, kind: ElementKind, per_lane: u64) -> FixedEntry {
    FixedEntry {
        field,
        kind,
        per_lane,
    }
}

/// Fixed-size entries in buffer order. `DebugData` is appended only when enabled.
pub(crate) const FIXED_ENTRIES: &[FixedEntry] = &[
    entry(StateField::Rng, ElementKind::Scalar, 1),
    entry(StateField::Throughput, ElementKind::Float3, 1),
    entry(StateField::LTransparent, ElementKind::Scalar, 1),
    entry(StateField::PathRadiance, ElementKind::PathRadiance, 1),
    entry(StateField::Ray, ElementKind::Ray, 1),
    entry(StateField::PathState, ElementKind::PathState, 1),
    entry(StateField::Isect, ElementKind::Intersection, 1),
    entry(StateField::AoAlpha, ElementKind::Float3, 1),
    entry(StateField::AoBsdf, ElementKind::Float3, 1),
    entry(StateField::AoLightRay, ElementKind::Ray, 1),
    entry(StateField::BsdfEval, ElementKind::BsdfEval, 1),
    entry(StateField::IsLamp, ElementKind::Scalar, 1),
    entry(StateField::LightRay, ElementKind::Ray, 1),
    entry(StateField::IsectShadow, ElementKind::Intersection, 2),
    entry(StateField::QueueData, ElementKind::Scalar, NUM_QUEUES * 2),
    entry(StateField::WorkArray, ElementKind::Scalar, 1),
];

pub(crate) const DEBUG_ENTRY: FixedEntry =
    entry(StateField::DebugData, ElementKind::DebugData, 1);
