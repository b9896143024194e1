//! Skeletal skinning data.
//!
//! A [`SkinnedMesh`] is bound to a [`Skeleton`]: an ordered list of bone
//! nodes plus one inverse bind matrix per bone. Bones are ordinary scene
//! nodes, so cloning a rig has to rebind the clone's skeleton to the cloned
//! bones (see [`instantiate`](crate::instantiate)).

use crate::math::Mat4;
use crate::scene::graph::SceneGraph;
use crate::scene::node::{MeshRef, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    pub bones: Vec<NodeId>,
    /// Inverse of each bone's world matrix in the bind pose.
    pub bone_inverses: Vec<Mat4>,
}

impl Skeleton {
    /// Build a skeleton whose bind pose is the bones' current world pose.
    pub fn from_current_pose(graph: &SceneGraph, bones: Vec<NodeId>) -> Self {
        let bone_inverses = bones
            .iter()
            .map(|&bone| graph.world_matrix(bone).inverse())
            .collect();
        Self {
            bones,
            bone_inverses,
        }
    }

    pub fn new(bones: Vec<NodeId>, bone_inverses: Vec<Mat4>) -> Self {
        Self {
            bones,
            bone_inverses,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkinnedMesh {
    pub mesh: MeshRef,
    skeleton: Option<Skeleton>,
    bind_matrix: Mat4,
    bind_matrix_inverse: Mat4,
}

impl SkinnedMesh {
    /// An unbound skinned mesh.
    pub fn new(mesh: MeshRef) -> Self {
        Self {
            mesh,
            skeleton: None,
            bind_matrix: Mat4::IDENTITY,
            bind_matrix_inverse: Mat4::IDENTITY,
        }
    }

    /// Bind to `skeleton` with the mesh's world matrix at bind time.
    pub fn bind(&mut self, skeleton: Skeleton, bind_matrix: Mat4) {
        self.skeleton = Some(skeleton);
        self.bind_matrix = bind_matrix;
        self.bind_matrix_inverse = bind_matrix.inverse();
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        self.skeleton.as_ref()
    }

    pub fn bind_matrix(&self) -> Mat4 {
        self.bind_matrix
    }

    pub fn bind_matrix_inverse(&self) -> Mat4 {
        self.bind_matrix_inverse
    }
}
