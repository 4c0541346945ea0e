pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    dim, edge_line, header, info, muted, risk, section, status, success, summary_row,
    symbol, timing, tree_line, warn,
};
pub use table::{stats_table, TableBuilder};
pub use theme::{theme, Theme};
