//! Widget rendering and reconciliation against the host page.

pub mod reconciler;
pub mod widget;

pub use reconciler::{reconcile, ReconcileReport};
pub use widget::{read_widget, widget_class, WidgetFields, WidgetView, WIDGET_CLASS};
