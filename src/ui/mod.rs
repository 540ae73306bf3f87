/// UI module
///
/// View functions for the two panes of the window:
/// - The sheet form with its photo slots (form.rs)
/// - The saved sheets list with selection and bulk actions (saved_list.rs)

pub mod form;
pub mod saved_list;
