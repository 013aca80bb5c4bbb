//! Scene graph and hierarchical scene organization.
//!
//! Every decoder normalizes its output into a tree of boxed [`SceneNode`]s:
//! [`ContainerNode`]s group and transform children, [`ModelNode`]s carry
//! geometry. Renderers only ever see `&dyn SceneNode`, regardless of the file
//! format the tree came from.

use std::fmt::Debug;

use cgmath::SquareMatrix;

use crate::data_structures::{model::Model, transform::Transform};

pub trait SceneNode: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Transform relative to the parent node.
    fn get_local_transform(&self) -> &Transform;

    fn set_local_transform(&mut self, transform: Transform);

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    fn add_child(&mut self, child: Box<dyn SceneNode>);

    /// Geometry attached to this node, if any.
    fn model(&self) -> Option<&Model>;
}

/// Calls `visit` for `node` and all of its descendants, depth first, together
/// with each node's world matrix.
pub fn walk(
    node: &dyn SceneNode,
    parent_world: &cgmath::Matrix4<f32>,
    visit: &mut dyn FnMut(&dyn SceneNode, &cgmath::Matrix4<f32>),
) {
    let world = parent_world * node.get_local_transform().to_matrix();
    visit(node, &world);
    for child in node.get_children() {
        walk(child.as_ref(), &world, visit);
    }
}

/// Same as [`walk`], starting from the identity.
pub fn walk_from_root(node: &dyn SceneNode, visit: &mut dyn FnMut(&dyn SceneNode, &cgmath::Matrix4<f32>)) {
    walk(node, &cgmath::Matrix4::identity(), visit);
}

/// Total number of triangles below and including `node`.
pub fn triangle_count(node: &dyn SceneNode) -> usize {
    let mut count = 0;
    walk_from_root(node, &mut |n, _| {
        count += n.model().map_or(0, Model::triangle_count);
    });
    count
}

/// Total number of nodes below and including `node`.
pub fn node_count(node: &dyn SceneNode) -> usize {
    1 + node
        .get_children()
        .iter()
        .map(|child| node_count(child.as_ref()))
        .sum::<usize>()
}

/// A transform-only grouping node.
#[derive(Debug, Default)]
pub struct ContainerNode {
    pub name: String,
    pub children: Vec<Box<dyn SceneNode>>,
    pub transform: Transform,
}

impl ContainerNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: Vec::new(),
            transform: Transform::default(),
        }
    }
}

impl SceneNode for ContainerNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_local_transform(&self) -> &Transform {
        &self.transform
    }

    fn set_local_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn model(&self) -> Option<&Model> {
        None
    }
}

/// A node that carries geometry and may have children of its own.
#[derive(Debug)]
pub struct ModelNode {
    name: String,
    children: Vec<Box<dyn SceneNode>>,
    transform: Transform,
    model: Model,
}

impl ModelNode {
    pub fn from_model(name: &str, model: Model) -> Self {
        Self {
            name: name.to_string(),
            children: vec![],
            transform: Transform::default(),
            model,
        }
    }
}

impl SceneNode for ModelNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_local_transform(&self) -> &Transform {
        &self.transform
    }

    fn set_local_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn model(&self) -> Option<&Model> {
        Some(&self.model)
    }
}
