use comfy_table::{Cell, Table};

use crate::core::models::Host;

/// Tableau indexé des machines trouvées, pour le choix
pub fn host_table(hosts: &[Host]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Index", "IP", "MAC", "Hostname"]);

    for (i, host) in hosts.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i),
            Cell::new(host.ip),
            Cell::new(host.mac),
            Cell::new(&host.hostname),
        ]);
    }

    table
}
