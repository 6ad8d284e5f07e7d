pub mod uloop;
