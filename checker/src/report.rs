//! Parser for the `report_route_status` summary table:
//!
//! ```text
//!    # of logical nets.......................... :         120 :
//!        # of nets not needing routing.......... :          40 :
//!        # of routable nets..................... :          80 :
//!            # of fully routed nets............. :          80 :
//!        # of nets with routing errors.......... :           0 :
//! ```

use crate::error::{OracleError, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteStatusResult {
    pub logical_nets: usize,
    pub nets_not_needing_routing: usize,
    pub routable_nets: usize,
    pub fully_routed_nets: usize,
    pub unrouted_nets: usize,
    pub partially_routed_nets: usize,
    pub nets_with_routing_errors: usize,
}

impl RouteStatusResult {
    /// Every routable net fully routed and no net with errors. Says nothing
    /// about whether the design has any nets at all.
    pub fn is_fully_routed(&self) -> bool {
        self.fully_routed_nets == self.routable_nets
            && self.unrouted_nets == 0
            && self.partially_routed_nets == 0
            && self.nets_with_routing_errors == 0
    }

    fn field_mut(&mut self, label: &str) -> Option<&mut usize> {
        match label {
            "logical nets" => Some(&mut self.logical_nets),
            "nets not needing routing" => Some(&mut self.nets_not_needing_routing),
            "routable nets" => Some(&mut self.routable_nets),
            "fully routed nets" => Some(&mut self.fully_routed_nets),
            "unrouted nets" => Some(&mut self.unrouted_nets),
            "partially routed nets" => Some(&mut self.partially_routed_nets),
            "nets with routing errors" => Some(&mut self.nets_with_routing_errors),
            _ => None,
        }
    }
}

/// Parses the summary out of a tool log or a service response. Unknown rows
/// and surrounding text are ignored; no summary at all is an error.
pub fn parse(text: &str) -> Result<RouteStatusResult> {
    let mut result = RouteStatusResult::default();
    let mut rows = 0;

    for line in text.lines() {
        let Some(row) = line.trim().strip_prefix("# of ") else {
            continue;
        };
        let mut cols = row.split(':');
        let label = cols.next().unwrap_or_default().trim_end().trim_end_matches('.');
        let value = cols.next().unwrap_or_default().trim();
        let Some(field) = result.field_mut(label) else {
            continue;
        };
        *field = value
            .parse()
            .map_err(|_| OracleError::Report(format!("bad count '{}' for '{}'", value, label)))?;
        rows += 1;
    }

    if rows == 0 {
        return Err(OracleError::Report(
            "no route status summary found".to_string(),
        ));
    }
    log::info!(
        "Route status: {} logical nets, {}/{} routable nets fully routed, {} with errors",
        result.logical_nets,
        result.fully_routed_nets,
        result.routable_nets,
        result.nets_with_routing_errors
    );
    Ok(result)
}
