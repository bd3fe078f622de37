pub mod flow_dto;
