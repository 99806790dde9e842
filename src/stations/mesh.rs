//! Delaunay mesh over station coordinates, used to test whether a query point is
//! surrounded by stations.

use crate::geo::projection::LatLon;
use crate::types::station::Station;
use log::{debug, warn};
use spade::handles::{FixedDirectedEdgeHandle, FixedFaceHandle, FixedVertexHandle, InnerTag};
use spade::{DelaunayTriangulation, HasPosition, Point2, PositionInTriangulation, Triangulation};
use std::sync::{Arc, RwLock};

/// A mesh vertex: x is longitude, y is latitude.
#[derive(Debug, Clone)]
pub struct StationVertex {
    pub station_id: String,
    pub position: Point2<f64>,
}

impl StationVertex {
    pub fn lat_lon(&self) -> LatLon {
        LatLon(self.position.y, self.position.x)
    }
}

impl HasPosition for StationVertex {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

pub struct StationMesh {
    triangulation: DelaunayTriangulation<StationVertex>,
    station_count: usize,
}

impl StationMesh {
    /// Triangulates the given stations. Returns `None` for fewer than three stations
    /// or when the coordinates cannot be inserted.
    pub fn build(stations: &[Station]) -> Option<Self> {
        if stations.len() < 3 {
            return None;
        }
        let vertices = stations
            .iter()
            .map(|station| StationVertex {
                station_id: station.id.clone(),
                position: Point2::new(station.location.longitude, station.location.latitude),
            })
            .collect();
        match DelaunayTriangulation::bulk_load(vertices) {
            Ok(triangulation) => {
                debug!(
                    "Built station mesh: {} vertices, {} triangles",
                    triangulation.num_vertices(),
                    triangulation.num_inner_faces()
                );
                Some(Self {
                    triangulation,
                    station_count: stations.len(),
                })
            }
            Err(e) => {
                warn!("Failed to triangulate {} stations: {:?}", stations.len(), e);
                None
            }
        }
    }

    /// Number of stations the mesh was built from (the cache key).
    pub fn station_count(&self) -> usize {
        self.station_count
    }

    /// The three corners of the triangle containing `point`, or `None` when the
    /// point lies outside the convex hull.
    ///
    /// Points exactly on an edge or vertex resolve to an adjacent triangle.
    pub fn enclosing(&self, point: LatLon) -> Option<[StationVertex; 3]> {
        let query = Point2::new(point.longitude(), point.latitude());
        let face = match self.triangulation.locate(query) {
            PositionInTriangulation::OnFace(face) => Some(face),
            PositionInTriangulation::OnEdge(edge) => self.face_beside_edge(edge),
            PositionInTriangulation::OnVertex(vertex) => self.face_around_vertex(vertex),
            PositionInTriangulation::OutsideOfConvexHull(_)
            | PositionInTriangulation::NoTriangulation => None,
        }?;
        let corners = self.triangulation.face(face).vertices();
        Some(corners.map(|vertex| vertex.data().clone()))
    }

    fn face_beside_edge(&self, edge: FixedDirectedEdgeHandle) -> Option<FixedFaceHandle<InnerTag>> {
        let edge = self.triangulation.directed_edge(edge);
        edge.face()
            .as_inner()
            .or_else(|| edge.rev().face().as_inner())
            .map(|face| face.fix())
    }

    fn face_around_vertex(&self, vertex: FixedVertexHandle) -> Option<FixedFaceHandle<InnerTag>> {
        self.triangulation
            .vertex(vertex)
            .out_edges()
            .find_map(|edge| edge.face().as_inner())
            .map(|face| face.fix())
    }
}

struct CachedMesh {
    key: usize,
    mesh: Option<Arc<StationMesh>>,
}

/// Process-wide mesh cache keyed by station count.
///
/// The mesh is rebuilt only when the number of stations changes; a station that
/// moves without the count changing is not noticed until [`TriangulationCache::invalidate`].
#[derive(Default)]
pub struct TriangulationCache {
    inner: RwLock<Option<CachedMesh>>,
}

impl TriangulationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mesh for `stations`, building it under the write lock when the cached one is stale.
    pub fn get_or_build(&self, stations: &[Station]) -> Option<Arc<StationMesh>> {
        let key = stations.len();
        {
            let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = guard.as_ref().filter(|c| c.key == key) {
                return cached.mesh.clone();
            }
        }

        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        // Another thread may have rebuilt while we waited for the lock.
        if let Some(cached) = guard.as_ref().filter(|c| c.key == key) {
            return cached.mesh.clone();
        }
        debug!("Rebuilding station mesh for {} stations", key);
        let mesh = StationMesh::build(stations).map(Arc::new);
        *guard = Some(CachedMesh {
            key,
            mesh: mesh.clone(),
        });
        mesh
    }

    pub fn invalidate(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
