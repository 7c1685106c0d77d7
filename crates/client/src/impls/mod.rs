mod bundler_client;
