pub mod my_app;
