//! Terminal stand-in for the map view.

use console::style;
use geotrack::viewport::Viewport;

/// Prints every camera move and marker placement.
#[derive(Debug, Default)]
pub struct ConsoleViewport;

impl Viewport for ConsoleViewport {
    fn center_on(&self, lng: f64, lat: f64, zoom: f64, animated: bool) {
        let how = if animated { "fly to" } else { "jump to" };
        println!(
            "  {} camera {} {:.5}, {:.5} at zoom {}",
            style("◎").cyan(),
            how,
            lat,
            lng,
            zoom
        );
    }

    fn place_marker(&self, lng: f64, lat: f64) {
        println!(
            "  {} marker at {:.5}, {:.5}",
            style("●").green(),
            lat,
            lng
        );
    }
}
