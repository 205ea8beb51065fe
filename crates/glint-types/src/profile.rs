//! Target capability profile: resource limits and language toggles.
//!
//! A profile is built once, validated at runtime start-up and then only read.
//! `CapabilityProfile::default()` is the reference desktop resource table;
//! individual limits are overridden through the builder or a TOML file.

use std::fmt;

pub use glint_ast::limits::Limits;

/// Declares the profile struct, its defaults and the builder setters from a
/// single field table so the three never drift apart.
macro_rules! capability_profile {
    ($($field:ident : $default:expr),* $(,)?) => {
        /// Resource limits of the compilation target.
        #[derive(Debug, Clone, PartialEq, Eq)]
        #[cfg_attr(
            feature = "serde",
            derive(serde::Serialize, serde::Deserialize),
            serde(default)
        )]
        pub struct CapabilityProfile {
            $(pub $field: i32,)*
            pub limits: Limits,
        }

        impl Default for CapabilityProfile {
            fn default() -> Self {
                CapabilityProfile {
                    $($field: $default,)*
                    limits: Limits::default(),
                }
            }
        }

        impl CapabilityProfileBuilder {
            $(
                pub fn $field(mut self, value: i32) -> Self {
                    self.profile.$field = value;
                    self
                }
            )*
        }

        impl CapabilityProfile {
            /// Every integer limit as `(name, value)`, in table order.
            pub fn entries(&self) -> Vec<(&'static str, i32)> {
                vec![$((stringify!($field), self.$field),)*]
            }
        }
    };
}

capability_profile! {
    max_lights: 32,
    max_clip_planes: 6,
    max_texture_units: 32,
    max_texture_coords: 32,
    max_vertex_attribs: 64,
    max_vertex_uniform_components: 4096,
    max_varying_floats: 64,
    max_vertex_texture_image_units: 32,
    max_combined_texture_image_units: 80,
    max_texture_image_units: 32,
    max_fragment_uniform_components: 4096,
    max_draw_buffers: 32,
    max_vertex_uniform_vectors: 128,
    max_varying_vectors: 8,
    max_fragment_uniform_vectors: 16,
    max_vertex_output_vectors: 16,
    max_fragment_input_vectors: 15,
    min_program_texel_offset: -8,
    max_program_texel_offset: 7,
    max_clip_distances: 8,
    // compute
    max_compute_work_group_count_x: 65535,
    max_compute_work_group_count_y: 65535,
    max_compute_work_group_count_z: 65535,
    max_compute_work_group_size_x: 1024,
    max_compute_work_group_size_y: 1024,
    max_compute_work_group_size_z: 64,
    max_compute_uniform_components: 1024,
    max_compute_texture_image_units: 16,
    max_compute_image_uniforms: 8,
    max_compute_atomic_counters: 8,
    max_compute_atomic_counter_buffers: 1,
    max_varying_components: 60,
    max_vertex_output_components: 64,
    max_geometry_input_components: 64,
    max_geometry_output_components: 128,
    max_fragment_input_components: 128,
    max_image_units: 8,
    max_combined_image_units_and_fragment_outputs: 8,
    max_combined_shader_output_resources: 8,
    max_image_samples: 0,
    max_vertex_image_uniforms: 0,
    max_tess_control_image_uniforms: 0,
    max_tess_evaluation_image_uniforms: 0,
    max_geometry_image_uniforms: 0,
    max_fragment_image_uniforms: 8,
    max_combined_image_uniforms: 8,
    max_geometry_texture_image_units: 16,
    max_geometry_output_vertices: 256,
    max_geometry_total_output_components: 1024,
    max_geometry_uniform_components: 1024,
    max_geometry_varying_components: 64,
    max_tess_control_input_components: 128,
    max_tess_control_output_components: 128,
    max_tess_control_texture_image_units: 16,
    max_tess_control_uniform_components: 1024,
    max_tess_control_total_output_components: 4096,
    max_tess_evaluation_input_components: 128,
    max_tess_evaluation_output_components: 128,
    max_tess_evaluation_texture_image_units: 16,
    max_tess_evaluation_uniform_components: 1024,
    max_tess_patch_components: 120,
    max_patch_vertices: 32,
    max_tess_gen_level: 64,
    max_viewports: 16,
    max_vertex_atomic_counters: 0,
    max_tess_control_atomic_counters: 0,
    max_tess_evaluation_atomic_counters: 0,
    max_geometry_atomic_counters: 0,
    max_fragment_atomic_counters: 8,
    max_combined_atomic_counters: 8,
    max_atomic_counter_bindings: 1,
    max_vertex_atomic_counter_buffers: 0,
    max_tess_control_atomic_counter_buffers: 0,
    max_tess_evaluation_atomic_counter_buffers: 0,
    max_geometry_atomic_counter_buffers: 0,
    max_fragment_atomic_counter_buffers: 1,
    max_combined_atomic_counter_buffers: 1,
    max_atomic_counter_buffer_size: 16384,
    max_transform_feedback_buffers: 4,
    max_transform_feedback_interleaved_components: 64,
    max_cull_distances: 8,
    max_combined_clip_and_cull_distances: 8,
    max_samples: 4,
    // mesh / task shading
    max_mesh_output_vertices_nv: 256,
    max_mesh_output_primitives_nv: 512,
    max_mesh_work_group_size_x_nv: 32,
    max_mesh_work_group_size_y_nv: 1,
    max_mesh_work_group_size_z_nv: 1,
    max_task_work_group_size_x_nv: 32,
    max_task_work_group_size_y_nv: 1,
    max_task_work_group_size_z_nv: 1,
    max_mesh_view_count_nv: 4,
    max_mesh_output_vertices_ext: 256,
    max_mesh_output_primitives_ext: 256,
    max_mesh_work_group_size_x_ext: 128,
    max_mesh_work_group_size_y_ext: 128,
    max_mesh_work_group_size_z_ext: 128,
    max_task_work_group_size_x_ext: 128,
    max_task_work_group_size_y_ext: 128,
    max_task_work_group_size_z_ext: 128,
    max_mesh_view_count_ext: 4,
    max_dual_source_draw_buffers_ext: 1,
}

/// Named-field builder over the default table.
#[derive(Debug, Clone, Default)]
pub struct CapabilityProfileBuilder {
    profile: CapabilityProfile,
}

impl CapabilityProfileBuilder {
    pub fn limits(mut self, limits: Limits) -> Self {
        self.profile.limits = limits;
        self
    }

    pub fn build(self) -> CapabilityProfile {
        self.profile
    }
}

/// A profile that cannot describe any real compute target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileError {
    pub field: &'static str,
    pub value: i32,
    pub reason: &'static str,
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid capability profile: {} = {} ({})",
            self.field, self.value, self.reason
        )
    }
}

impl std::error::Error for ProfileError {}

impl CapabilityProfile {
    pub fn builder() -> CapabilityProfileBuilder {
        CapabilityProfileBuilder::default()
    }

    /// Compute work group size limits as `[x, y, z]`.
    pub fn max_work_group_size(&self) -> [i32; 3] {
        [
            self.max_compute_work_group_size_x,
            self.max_compute_work_group_size_y,
            self.max_compute_work_group_size_z,
        ]
    }

    pub fn max_work_group_count(&self) -> [i32; 3] {
        [
            self.max_compute_work_group_count_x,
            self.max_compute_work_group_count_y,
            self.max_compute_work_group_count_z,
        ]
    }

    /// Checks the limits the compute pipeline depends on.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let positive = [
            ("max_compute_work_group_size_x", self.max_compute_work_group_size_x),
            ("max_compute_work_group_size_y", self.max_compute_work_group_size_y),
            ("max_compute_work_group_size_z", self.max_compute_work_group_size_z),
            ("max_compute_work_group_count_x", self.max_compute_work_group_count_x),
            ("max_compute_work_group_count_y", self.max_compute_work_group_count_y),
            ("max_compute_work_group_count_z", self.max_compute_work_group_count_z),
        ];
        for (field, value) in positive {
            if value < 1 {
                return Err(ProfileError {
                    field,
                    value,
                    reason: "must be at least 1",
                });
            }
        }
        for (field, value) in self.entries() {
            if field.starts_with("max_") && value < 0 {
                return Err(ProfileError {
                    field,
                    value,
                    reason: "limits cannot be negative",
                });
            }
        }
        if self.min_program_texel_offset > self.max_program_texel_offset {
            return Err(ProfileError {
                field: "min_program_texel_offset",
                value: self.min_program_texel_offset,
                reason: "greater than max_program_texel_offset",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference_table() {
        let p = CapabilityProfile::default();
        assert_eq!(p.max_compute_work_group_size_x, 1024);
        assert_eq!(p.max_compute_work_group_size_z, 64);
        assert_eq!(p.max_compute_image_uniforms, 8);
        assert_eq!(p.min_program_texel_offset, -8);
        assert_eq!(p.max_dual_source_draw_buffers_ext, 1);
        assert!(p.limits.general_sampler_indexing);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn builder_overrides_single_fields() {
        let p = CapabilityProfile::builder()
            .max_compute_work_group_size_x(256)
            .max_compute_atomic_counters(0)
            .build();
        assert_eq!(p.max_compute_work_group_size_x, 256);
        assert_eq!(p.max_compute_atomic_counters, 0);
        assert_eq!(p.max_compute_work_group_size_y, 1024);
    }

    #[test]
    fn entries_cover_the_whole_table() {
        let p = CapabilityProfile::default();
        let entries = p.entries();
        assert!(entries.len() > 90);
        assert_eq!(entries[0], ("max_lights", 32));
    }

    #[test]
    fn zero_work_group_size_is_rejected() {
        let p = CapabilityProfile::builder()
            .max_compute_work_group_size_y(0)
            .build();
        let err = p.validate().unwrap_err();
        assert_eq!(err.field, "max_compute_work_group_size_y");
    }
}
