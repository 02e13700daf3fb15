mod assistant_flow_test;
mod common;
mod key_flow_test;
mod scroll_mouse_test;
mod timeline_input_render_test;
