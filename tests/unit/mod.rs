mod frame_csv;
mod transform_properties;
