use serde::Serialize;

use crate::model::{TrackId, TrackKind, VisualProperties};
use crate::session::Session;

/// One visual track resolved for drawing at a point in time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DrawNode {
    pub track_id: TrackId,
    pub kind: TrackKind,
    pub url: String,
    pub layer: i32,
    pub z_index: i32,
    /// Local media time within the track, seconds.
    pub local_time: f64,
    pub visual: VisualProperties,
}

/// Resolve the ordered draw list for `time`.
///
/// Pure function of the session snapshot: non-hidden video/image tracks whose
/// window contains `time`, sorted ascending by `(layer, z_index, insertion
/// order)`. Later entries draw on top.
pub fn draw_list(session: &Session, time: f64) -> Vec<DrawNode> {
    let mut nodes: Vec<(i32, i32, usize, DrawNode)> = session
        .tracks()
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.hidden() && t.contains(time))
        .filter_map(|(index, t)| {
            let visual = t.visual()?.clone();
            let node = DrawNode {
                track_id: t.id().to_string(),
                kind: t.kind(),
                url: t.url().to_string(),
                layer: t.layer(),
                z_index: visual.z_index,
                local_time: time - t.start(),
                visual,
            };
            Some((node.layer, node.z_index, index, node))
        })
        .collect();

    nodes.sort_by_key(|(layer, z, index, _)| (*layer, *z, *index));
    nodes.into_iter().map(|(_, _, _, node)| node).collect()
}
