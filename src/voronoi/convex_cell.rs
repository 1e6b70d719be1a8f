use std::cmp::Ordering;
use std::marker::PhantomData;

use glam::DVec3;
use log::debug;

use super::{boundary::BoundingCube, half_space::HalfSpace, integrals::FaceIntegral};
use crate::{
    geometry::{in_sphere_test_exact, intersect_planes},
    simple_cycle::SimpleCycle,
};

/// A vertex of a [`ConvexCell`].
#[derive(Clone, Debug)]
pub(super) struct Vertex {
    /// The location of the [`Vertex`], relative to the central point.
    pub loc: DVec3,
    /// The dual representation: the indices of the three half spaces in the
    /// corresponding vector in the [`ConvexCell`], that intersect at this
    /// [`Vertex`] (in counterclockwise order around the vertex).
    pub dual: [usize; 3],
}

impl Vertex {
    fn from_dual(i: usize, j: usize, k: usize, half_spaces: &[HalfSpace]) -> Self {
        let loc =
            intersect_planes(&half_spaces[i].plane, &half_spaces[j].plane, &half_spaces[k].plane);
        Vertex { loc, dual: [i, j, k] }
    }

    fn plane_idx(&self, clipping_plane_idx: usize) -> Option<usize> {
        self.dual.iter().position(|&idx| idx == clipping_plane_idx)
    }
}

pub(crate) trait ConvexCellMarker: Clone + Default + std::fmt::Debug {}

#[derive(Copy, Clone, Default, Debug)]
pub(crate) struct WithoutFaces;
impl ConvexCellMarker for WithoutFaces {}
#[derive(Copy, Clone, Default, Debug)]
pub(crate) struct WithFaces;
impl ConvexCellMarker for WithFaces {}

#[derive(Clone, Debug)]
struct ConvexCellFace {
    /// The index of the clipping plane/half-space of the [`ConvexCell`]
    /// corresponding to this face.
    clipping_plane: usize,
    vertex_count: usize,
    vertex_offset: usize,
}

/// The Voronoi cell of the central point (the origin) among a set of
/// candidates, represented as an intersection of [`HalfSpace`]s.
///
/// Starts out as a [`BoundingCube`] which is cut down by the bisector plane
/// of every candidate. Once all cuts are done the cell is converted into a
/// [`ConvexCell<WithFaces>`], which exposes the face topology.
#[derive(Clone, Debug)]
pub(crate) struct ConvexCell<T: ConvexCellMarker> {
    /// [`HalfSpace`]s that intersect to form this [`ConvexCell`]. The first
    /// six are the faces of the bounding cube.
    pub(super) clipping_planes: Vec<HalfSpace>,
    /// The vertices of this cell (relative to the central point).
    pub(super) vertices: Vec<Vertex>,
    faces: Vec<ConvexCellFace>,
    /// List containing the indices of the vertices of the faces
    face_vertex_connections: Vec<usize>,
    boundary: SimpleCycle,
    /// Number of clipping decisions that had to be made exactly.
    exact_decisions: usize,
    _phantom: PhantomData<T>,
}

impl ConvexCell<WithoutFaces> {
    /// Initialize the cell as the bounding cube.
    pub(super) fn init(bounding_cube: &BoundingCube) -> Self {
        let clipping_planes = bounding_cube.clipping_planes();

        let vertices = vec![
            Vertex::from_dual(2, 5, 0, &clipping_planes),
            Vertex::from_dual(5, 3, 0, &clipping_planes),
            Vertex::from_dual(1, 5, 2, &clipping_planes),
            Vertex::from_dual(5, 1, 3, &clipping_planes),
            Vertex::from_dual(4, 2, 0, &clipping_planes),
            Vertex::from_dual(4, 0, 3, &clipping_planes),
            Vertex::from_dual(2, 4, 1, &clipping_planes),
            Vertex::from_dual(4, 3, 1, &clipping_planes),
        ];

        Self {
            boundary: SimpleCycle::new(clipping_planes.len()),
            clipping_planes,
            vertices,
            faces: vec![],
            face_vertex_connections: vec![],
            exact_decisions: 0,
            _phantom: PhantomData,
        }
    }

    /// Build the cell of the origin by cutting the bounding cube with the
    /// bisector plane of every candidate in `points[1..]`. `points[0]` is the
    /// central point itself, which must be the origin.
    pub(super) fn build(points: &[DVec3], bounding_cube: &BoundingCube) -> Self {
        let mut cell = ConvexCell::init(bounding_cube);
        for (idx, &loc) in points.iter().enumerate().skip(1) {
            // A candidate on top of the center has no bisector plane
            if loc == DVec3::ZERO {
                continue;
            }
            cell.clip_by_plane(HalfSpace::new(loc, bounding_cube.iloc(loc), Some(idx)));
        }
        if cell.exact_decisions > 0 {
            debug!(
                "{} near-degenerate clipping decisions were resolved exactly",
                cell.exact_decisions
            );
        }

        cell
    }

    /// Test whether `vertex` is clipped away by `half_space`.
    ///
    /// Clearly separated cases are decided in floating point. Near-degenerate
    /// ones fall back to the exact in-sphere test on the integer grid: the
    /// vertex is the center of the sphere through the origin and the three
    /// points defining it, so it is clipped iff the new point lies strictly
    /// inside that sphere. Ties keep the vertex.
    fn is_clipped(&mut self, vertex_idx: usize, half_space: &HalfSpace) -> bool {
        let vertex = &self.vertices[vertex_idx];
        let clip = half_space.clip(vertex.loc);
        if clip.abs() > half_space.tolerance(vertex.loc) {
            return clip < 0.;
        }

        let [i, j, k] = vertex.dual;
        let ordering = in_sphere_test_exact(
            &self.clipping_planes[i].iloc,
            &self.clipping_planes[j].iloc,
            &self.clipping_planes[k].iloc,
            &half_space.iloc,
        );
        self.exact_decisions += 1;
        ordering == Ordering::Less
    }

    pub(super) fn clip_by_plane(&mut self, p: HalfSpace) {
        // loop over vertices and remove the ones clipped by p
        let mut i = 0;
        let mut num_v = self.vertices.len();
        while i < num_v {
            if self.is_clipped(i, &p) {
                num_v -= 1;
                self.vertices.swap(i, num_v);
            } else {
                i += 1;
            }
        }

        // Were any vertices clipped?
        if num_v == self.vertices.len() {
            return;
        }
        assert!(num_v > 0, "The central point is never clipped away!");

        // Add the new clipping plane
        let p_idx = self.clipping_planes.len();
        self.clipping_planes.push(p);
        self.boundary.grow();
        // Compute the boundary of the (dual) topological triangulated disk around the
        // vertices to be removed.
        Self::compute_boundary(&mut self.boundary, &mut self.vertices[num_v..]);
        let mut boundary = self.boundary.iter().take(self.boundary.len + 1);
        // finally we can *really* remove the vertices.
        self.vertices.truncate(num_v);
        // Add new vertices constructed from the new clipping plane and the boundary
        let mut cur = boundary
            .next()
            .expect("Boundary contains at least 3 elements");
        for next in boundary {
            self.vertices
                .push(Vertex::from_dual(cur, next, p_idx, &self.clipping_planes));
            cur = next;
        }
    }

    fn compute_boundary(boundary: &mut SimpleCycle, vertices: &mut [Vertex]) {
        boundary.init(vertices[0].dual[0], vertices[0].dual[1], vertices[0].dual[2]);

        for i in 1..vertices.len() {
            // Look for a suitable next vertex to extend the boundary
            let mut idx = i;
            loop {
                assert!(idx < vertices.len(), "No suitable vertex found to extend boundary!");
                let vertex = &vertices[idx].dual;
                if boundary.try_extend(vertex[0], vertex[1], vertex[2]) {
                    vertices.swap(i, idx);
                    break;
                }
                idx += 1;
            }
        }
    }

    /// Convert this [`ConvexCell`] into one with face information stored.
    /// This makes it impossible to clip this [`ConvexCell`] with additional half spaces.
    pub(super) fn with_faces(mut self) -> ConvexCell<WithFaces> {
        // Collect the vertices on all clipping planes (if any)
        let mut face_vertex_connections = vec![vec![]; self.clipping_planes.len()];
        for (idx, vertex) in self.vertices.iter().enumerate() {
            face_vertex_connections[vertex.dual[0]].push(idx);
            face_vertex_connections[vertex.dual[1]].push(idx);
            face_vertex_connections[vertex.dual[2]].push(idx);
        }
        // Sort the face vertices in counterclockwise order for each face
        face_vertex_connections
            .iter_mut()
            .enumerate()
            .for_each(|(clipping_plane_idx, vertices)| {
                self.sort_face_vertices(vertices, clipping_plane_idx)
            });

        // Create a new face if the corresponding half space contains some vertices
        let mut offset = 0;
        self.faces = face_vertex_connections
            .iter()
            .enumerate()
            .filter_map(|(id, vertices)| {
                if vertices.is_empty() {
                    return None;
                }
                let face = ConvexCellFace {
                    clipping_plane: id,
                    vertex_count: vertices.len(),
                    vertex_offset: offset,
                };
                offset += face.vertex_count;
                Some(face)
            })
            .collect();
        self.face_vertex_connections = face_vertex_connections.into_iter().flatten().collect();

        ConvexCell::transition(self)
    }

    /// Sort the vertices on the given clipping plane, by walking from vertex to
    /// vertex along the edges of the face.
    fn sort_face_vertices(&self, vert_idx: &mut [usize], clipping_plane_idx: usize) {
        // Empty face?
        if vert_idx.is_empty() {
            return;
        }

        let cur_v = &self.vertices[vert_idx[0]];
        let p_idx_in_cur_v = cur_v
            .plane_idx(clipping_plane_idx)
            .expect("Plane contained in vertex by construction");
        // Get the other plane contained in the next vertex
        let mut next_plane = cur_v.dual[(p_idx_in_cur_v + 2) % 3];

        let mut cur_idx = 1;
        while cur_idx < vert_idx.len() - 1 {
            let mut test_idx = cur_idx;
            // loop through the tail of the list and swap the next vertex to cur_idx
            while test_idx < vert_idx.len() {
                let cur_v = &self.vertices[vert_idx[test_idx]];
                let p_idx_in_cur_v = cur_v
                    .plane_idx(clipping_plane_idx)
                    .expect("All given vertices must contain clipping plane");
                if cur_v.dual.contains(&next_plane) {
                    next_plane = cur_v.dual[(p_idx_in_cur_v + 2) % 3];
                    vert_idx.swap(cur_idx, test_idx);
                    cur_idx += 1;
                    break;
                }
                test_idx += 1;
            }
            assert!(
                test_idx < vert_idx.len(),
                "There always must be a next vertex connected to the current one!"
            );
        }
    }
}

impl<M: ConvexCellMarker> ConvexCell<M> {
    /// Safely transition between two states
    fn transition<N: ConvexCellMarker>(self) -> ConvexCell<N> {
        let ConvexCell {
            clipping_planes,
            vertices,
            faces,
            face_vertex_connections,
            boundary,
            exact_decisions,
            _phantom: _,
        } = self;

        ConvexCell::<N> {
            clipping_planes,
            vertices,
            faces,
            face_vertex_connections,
            boundary,
            exact_decisions,
            _phantom: PhantomData,
        }
    }

    /// The number of vertices of this cell
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

impl ConvexCell<WithFaces> {
    /// The number of *actual* faces (might be less than the number of
    /// [`HalfSpace`]s used in the construction of this cell).
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn half_space(&self, face_idx: usize) -> &HalfSpace {
        &self.clipping_planes[self.faces[face_idx].clipping_plane]
    }

    /// Get the index of the candidate on the opposite side of a face.
    /// Returns None for faces of the bounding cube.
    pub fn neighbour(&self, face_idx: usize) -> Option<usize> {
        self.half_space(face_idx).neighbour
    }

    /// Get the indices of the vertices of a given face in this cell's
    /// [`Vertex`] list, in cyclic order.
    pub fn face_vertices(&self, face_idx: usize) -> &[usize] {
        let face = &self.faces[face_idx];
        &self.face_vertex_connections[face.vertex_offset..face.vertex_offset + face.vertex_count]
    }

    /// Location of a vertex, relative to the central point.
    pub fn vertex(&self, vertex_idx: usize) -> DVec3 {
        self.vertices[vertex_idx].loc
    }

    /// Compute a custom integrated quantity for every face of this cell, in
    /// face order.
    pub fn compute_face_integrals<T: FaceIntegral>(&self) -> Vec<T> {
        (0..self.face_count())
            .map(|face_idx| {
                let vertices = self.face_vertices(face_idx);
                let mut integral = T::init(self, face_idx);
                let v0 = self.vertex(vertices[0]);
                for edge in vertices[1..].windows(2) {
                    integral.collect(v0, self.vertex(edge[0]), self.vertex(edge[1]), DVec3::ZERO);
                }
                integral.finalize()
            })
            .collect()
    }
}
