pub(crate) mod dsv_file;
