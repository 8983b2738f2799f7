pub mod driver;
pub mod external;
pub mod selector;

use contest_common::db::core::Design;
use contest_common::util::config::RouterConfig;
use driver::{RouteError, RouteSummary, Router, RouterArgs};

/// Partial routing of a design: alternate-source discovery, pin selection
/// and a checked router invocation over the selected pins only.
pub fn route_design(
    design: &mut Design,
    config: &RouterConfig,
    router: &mut dyn Router,
) -> Result<RouteSummary, RouteError> {
    selector::discover_alternate_sources(design);
    let pins = selector::select_pins_to_route(design);
    let args = RouterArgs::from_config(config);
    driver::route(design, &pins, &args, router)
}
