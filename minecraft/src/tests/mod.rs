mod field_types;
mod packets;
