pub mod txt;
