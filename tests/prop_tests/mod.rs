#[path = "query/prop_query.rs"]
mod prop_query;
#[path = "query/prop_sort.rs"]
mod prop_sort;
#[path = "shell/prop_shell.rs"]
mod prop_shell;
