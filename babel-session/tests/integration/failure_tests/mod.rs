mod test_transport_failure;
