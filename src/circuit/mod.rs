pub mod gadgets;
