//! Spawn positioning for new clusters.

use crate::geometry::{TransformDelta, TransformError, Transformer};
use crate::links::generate_link_id;
use crate::placeables::{ObjectKey, Placeable, PlaceableData};
use crate::store::{StorageError, UpdateContext, WriteGateway};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Spawn errors.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("Cannot position an empty cluster")]
    EmptyCluster,
    #[error("Unknown pivot: {0}")]
    UnknownPivot(String),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Named reference point within a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pivot {
    TopLeft,
    #[default]
    Center,
    /// Bottom center.
    Bottom,
}

impl Pivot {
    pub fn resolve(self, bounds: Rect) -> Point {
        match self {
            Pivot::TopLeft => bounds.origin(),
            Pivot::Center => bounds.center(),
            Pivot::Bottom => Point::new(bounds.center().x, bounds.y1),
        }
    }
}

impl FromStr for Pivot {
    type Err = SpawnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "top_left" | "topleft" => Ok(Pivot::TopLeft),
            "center" | "centre" => Ok(Pivot::Center),
            "bottom" | "bottom_center" => Ok(Pivot::Bottom),
            _ => Err(SpawnError::UnknownPivot(s.to_string())),
        }
    }
}

impl fmt::Display for Pivot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Pivot::TopLeft => "top_left",
            Pivot::Center => "center",
            Pivot::Bottom => "bottom",
        })
    }
}

/// Union of the bounding boxes, or `None` for an empty cluster.
pub fn cluster_bounds<'a>(data: impl IntoIterator<Item = &'a PlaceableData>) -> Option<Rect> {
    data.into_iter()
        .map(PlaceableData::bounds)
        .reduce(|a, b| a.union(b))
}

/// Scale factor moving a cluster from one grid size to another.
pub fn grid_scale_factor(source_grid: f64, target_grid: f64) -> Option<f64> {
    let valid = |g: f64| g.is_finite() && g > 0.0;
    (valid(source_grid) && valid(target_grid)).then(|| target_grid / source_grid)
}

/// Move a cluster so its pivot lands on `target`.
///
/// An optional grid-relative scale runs first, in the same transform
/// pass. Returns the translation that was applied.
pub fn position_cluster(
    objects: &mut [Placeable],
    target: Point,
    pivot: Pivot,
    scale: Option<f64>,
    transformer: &Transformer,
) -> Result<Vec2, SpawnError> {
    let scale = scale.filter(|s| *s != 1.0);
    let bounds = match scale {
        Some(factor) => {
            let scale_only = TransformDelta {
                scale: Some(factor),
                grid_relative_scale: true,
                ..TransformDelta::default()
            };
            let mut scaled = Vec::with_capacity(objects.len());
            for object in objects.iter() {
                let mut data = object.data.clone();
                transformer.apply(&mut data, Point::ZERO, &scale_only, None)?;
                scaled.push(data);
            }
            cluster_bounds(&scaled)
        }
        None => cluster_bounds(objects.iter().map(|o| &o.data)),
    }
    .ok_or(SpawnError::EmptyCluster)?;

    let offset = target - pivot.resolve(bounds);
    let delta = TransformDelta {
        dx: offset.x,
        dy: offset.y,
        scale,
        grid_relative_scale: scale.is_some(),
        ..TransformDelta::default()
    };
    for object in objects.iter_mut() {
        transformer.apply(&mut object.data, Point::ZERO, &delta, None)?;
    }
    Ok(offset)
}

/// Give every object a fresh id and every link a fresh link id, so copies
/// link among themselves and not to their source.
pub fn regenerate_ids(objects: &mut [Placeable]) {
    let mut link_ids: HashMap<String, String> = HashMap::new();
    for object in objects.iter_mut() {
        object.id = Uuid::new_v4().simple().to_string();
        for link in &mut object.metadata.links {
            let fresh = link_ids
                .entry(link.id.clone())
                .or_insert_with(generate_link_id);
            link.id = fresh.clone();
        }
    }
}

/// Position a copy of `objects` at `target` and create it.
pub async fn spawn_cluster(
    gateway: &WriteGateway,
    mut objects: Vec<Placeable>,
    target: Point,
    pivot: Pivot,
    scale: Option<f64>,
    transformer: &Transformer,
) -> Result<Vec<ObjectKey>, SpawnError> {
    regenerate_ids(&mut objects);
    position_cluster(&mut objects, target, pivot, scale, transformer)?;
    let keys = gateway
        .create_documents(objects, UpdateContext::ignoring_links())
        .await?;
    log::info!("Spawned {} objects at ({}, {})", keys.len(), target.x, target.y);
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::{LinkType, add_link};
    use crate::placeables::{Token, Wall};

    fn cluster() -> Vec<Placeable> {
        vec![
            Placeable::with_id(
                "t",
                PlaceableData::Token(Token::new(Point::new(0.0, 0.0), 100.0, 100.0)),
            ),
            Placeable::with_id("w", PlaceableData::Wall(Wall::new([100.0, 0.0, 200.0, 50.0]))),
        ]
    }

    #[test]
    fn test_center_pivot_lands_on_target() {
        let mut objects = cluster();
        let offset = position_cluster(
            &mut objects,
            Point::new(1000.0, 1000.0),
            Pivot::Center,
            None,
            &Transformer::default(),
        )
        .unwrap();
        assert_eq!(offset, Vec2::new(900.0, 950.0));
        let bounds = cluster_bounds(objects.iter().map(|o| &o.data)).unwrap();
        assert_eq!(bounds.center(), Point::new(1000.0, 1000.0));
    }

    #[test]
    fn test_scale_applied_before_translate() {
        let mut objects = cluster();
        position_cluster(
            &mut objects,
            Point::ZERO,
            Pivot::TopLeft,
            Some(0.5),
            &Transformer::default(),
        )
        .unwrap();
        let PlaceableData::Wall(wall) = &objects[1].data else {
            unreachable!()
        };
        assert_eq!(wall.c, [50.0, 0.0, 100.0, 25.0]);
        let PlaceableData::Token(token) = &objects[0].data else {
            unreachable!()
        };
        // grid relative: size stays in grid units
        assert!((token.width - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bottom_pivot() {
        let pivot = Pivot::Bottom.resolve(Rect::new(0.0, 0.0, 10.0, 20.0));
        assert_eq!(pivot, Point::new(5.0, 20.0));
        assert_eq!("top-left".parse::<Pivot>().unwrap(), Pivot::TopLeft);
        assert!("middle".parse::<Pivot>().is_err());
    }

    #[test]
    fn test_empty_cluster_is_error() {
        let result = position_cluster(
            &mut [],
            Point::ZERO,
            Pivot::Center,
            None,
            &Transformer::default(),
        );
        assert!(matches!(result, Err(SpawnError::EmptyCluster)));
    }

    #[test]
    fn test_regenerate_ids_remaps_links_consistently() {
        let mut objects = cluster();
        add_link(&mut objects[0], "L1", LinkType::TwoWay, None);
        add_link(&mut objects[1], "L1", LinkType::Receive, None);
        regenerate_ids(&mut objects);
        assert_ne!(objects[0].id, "t");
        let a = &objects[0].metadata.links[0].id;
        let b = &objects[1].metadata.links[0].id;
        assert_ne!(a, "L1");
        assert_eq!(a, b);
    }

    #[test]
    fn test_grid_scale_factor() {
        assert_eq!(grid_scale_factor(100.0, 50.0), Some(0.5));
        assert_eq!(grid_scale_factor(0.0, 50.0), None);
    }
}
