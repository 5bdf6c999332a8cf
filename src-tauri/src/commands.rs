use crate::feed::HttpStatusFeed;
use crate::session::MapSession;
use crate::types::{Bay, Decision, FetchTicket, GeoPoint, Viewport};
use tauri::State;

pub struct SessionState(pub MapSession<HttpStatusFeed>);

#[tauri::command]
pub async fn get_bays(session: State<'_, SessionState>) -> Result<Vec<Bay>, String> {
    let catalog = session.0.catalog();
    let guard = catalog
        .read()
        .map_err(|e| format!("Failed to read bay catalogue: {e}"))?;
    Ok(guard.all())
}

#[tauri::command]
pub async fn get_bays_in_view(
    lat: f64,
    lng: f64,
    radius_m: f64,
    session: State<'_, SessionState>,
) -> Result<Vec<Bay>, String> {
    let catalog = session.0.catalog();
    let guard = catalog
        .read()
        .map_err(|e| format!("Failed to read bay catalogue: {e}"))?;
    Ok(guard.bays_within(GeoPoint::new(lat, lng), radius_m))
}

/// Called by the map view whenever the camera goes idle.
#[tauri::command]
pub async fn viewport_settled(
    viewport: Viewport,
    session: State<'_, SessionState>,
) -> Result<Decision, String> {
    Ok(session.0.viewport_settled(&viewport))
}

#[tauri::command]
pub async fn get_freshness(session: State<'_, SessionState>) -> Result<Option<FetchTicket>, String> {
    Ok(session.0.last_fetch())
}
